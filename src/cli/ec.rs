use crate::api::protocol::WatchRequest;
use crate::cli::Client;
use crate::entity::{Entity, Lifetime};
use crate::filter::{ConfigFilter, EntityFilter, GeoFilter, TaskableFilter};
use crate::geo::{Geometry, LineString, LonLat, PlanarGeometry, Polygon};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Args;
use futures::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::io::Read;
use tokio_tungstenite::tungstenite::Message;

#[derive(Args)]
pub struct LsArgs {
    /// keep entities with these component tags (e.g. 2=label, 11=geo, 23=taskable)
    #[arg(long, value_delimiter = ',')]
    pub with: Vec<u32>,

    /// drop entities carrying any of these component tags
    #[arg(long, value_delimiter = ',')]
    pub without: Vec<u32>,

    /// filter by configuration controller ID
    #[arg(long = "config-controller")]
    pub config_controller: Option<String>,

    /// filter by taskable context entity ID
    #[arg(long = "taskable-context")]
    pub taskable_context: Option<String>,

    /// filter by taskable assignee entity ID
    #[arg(long = "taskable-assignee")]
    pub taskable_assignee: Option<String>,

    /// filter by bounding box: lon1,lat1,lon2,lat2
    #[arg(long)]
    pub bbox: Option<String>,

    /// output format: table, yaml, json
    #[arg(short, long, default_value = "table")]
    pub output: String,
}

pub async fn run_ls(client: &Client, args: LsArgs) -> Result<()> {
    let filter = build_filter(&args)?;
    let mut entities = client.list(filter).await?;

    // The matcher has no conjunction of negations, so the exclusion flags
    // are applied here after the fetch
    if !args.without.is_empty() {
        entities.retain(|e| !args.without.iter().any(|&tag| e.has_component(tag)));
    }

    match args.output.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&entities)?),
        "yaml" => {
            for entity in &entities {
                println!("---");
                print!("{}", serde_yaml::to_string(entity)?);
            }
        }
        "table" => print_table(&entities),
        other => bail!("unknown output format {other:?} (expected table, yaml, json)"),
    }

    Ok(())
}

fn build_filter(args: &LsArgs) -> Result<Option<EntityFilter>> {
    let mut filter = EntityFilter {
        component: args.with.clone(),
        ..Default::default()
    };

    if let Some(controller) = &args.config_controller {
        filter.config = Some(ConfigFilter {
            controller: Some(controller.clone()),
            key: None,
        });
    }

    if args.taskable_context.is_some() || args.taskable_assignee.is_some() {
        filter.taskable = Some(TaskableFilter {
            context: args.taskable_context.clone(),
            assignee: args.taskable_assignee.clone(),
        });
    }

    if let Some(bbox) = &args.bbox {
        filter.geo = Some(GeoFilter {
            geometry: Some(Geometry::from_planar(parse_bbox(bbox)?)),
            geo_entity_id: None,
        });
    }

    if filter == EntityFilter::default() {
        return Ok(None);
    }
    Ok(Some(filter))
}

fn parse_bbox(bbox: &str) -> Result<PlanarGeometry> {
    let parts: Vec<f64> = bbox
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid bbox {bbox:?}"))?;
    if parts.len() != 4 {
        bail!("bbox must be lon1,lat1,lon2,lat2");
    }

    let (lon1, lat1, lon2, lat2) = (parts[0], parts[1], parts[2], parts[3]);
    Ok(PlanarGeometry::Polygon(Polygon {
        outer: LineString {
            points: vec![
                LonLat { longitude: lon1, latitude: lat1 },
                LonLat { longitude: lon2, latitude: lat1 },
                LonLat { longitude: lon2, latitude: lat2 },
                LonLat { longitude: lon1, latitude: lat2 },
            ],
        },
        holes: vec![],
    }))
}

fn print_table(entities: &[Entity]) {
    let mut id_width = 2;
    let mut label_width = 5;
    for e in entities {
        id_width = id_width.max(e.id.len());
        label_width = label_width.max(e.label.as_deref().unwrap_or("").len());
    }

    println!(
        "{:<id_width$}  {:<label_width$}  {:<11}  POSITION",
        "ID", "LABEL", "PRIORITY"
    );
    for e in entities {
        let position = e
            .geo
            .map(|p| format!("{:.5},{:.5}", p.latitude, p.longitude))
            .unwrap_or_default();
        println!(
            "{:<id_width$}  {:<label_width$}  {:<11}  {}",
            e.id,
            e.label.as_deref().unwrap_or(""),
            e.priority.map(|p| format!("{p:?}")).unwrap_or_default(),
            position
        );
    }
}

pub async fn run_get(client: &Client, id: &str) -> Result<()> {
    let entity = client.get(id).await?;
    println!("{}", serde_json::to_string_pretty(&entity)?);
    Ok(())
}

pub async fn run_put(client: &Client, file: &str) -> Result<()> {
    let contents = if file == "-" {
        let mut buffer = String::new();
        std::io::stdin()
            .read_to_string(&mut buffer)
            .context("failed to read stdin")?;
        buffer
    } else {
        std::fs::read_to_string(file).with_context(|| format!("failed to read {file}"))?
    };

    let entities = parse_entities(&contents)?;
    if entities.is_empty() {
        bail!("no entities found in input");
    }

    let count = entities.len();
    client.push(entities).await?;
    println!("pushed {count} entities");
    Ok(())
}

/// Parse entity input, auto-detecting JSON (object or array) versus YAML
/// (possibly multi-document).
fn parse_entities(contents: &str) -> Result<Vec<Entity>> {
    let trimmed = contents.trim_start();
    if trimmed.starts_with('[') {
        return serde_json::from_str(contents).context("failed to parse JSON entity array");
    }
    if trimmed.starts_with('{') {
        let entity: Entity =
            serde_json::from_str(contents).context("failed to parse JSON entity")?;
        return Ok(vec![entity]);
    }

    let mut entities = Vec::new();
    for document in serde_yaml::Deserializer::from_str(contents) {
        entities.push(Entity::deserialize(document).context("failed to parse YAML entity")?);
    }
    Ok(entities)
}

pub async fn run_edit(client: &Client, id: &str) -> Result<()> {
    let entity = client.get(id).await?;
    let original = serde_yaml::to_string(&entity)?;

    let file = tempfile::Builder::new()
        .prefix("atlas-edit-")
        .suffix(".yaml")
        .tempfile()
        .context("failed to create temp file")?;
    std::fs::write(file.path(), &original)?;

    let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
    let status = std::process::Command::new(&editor)
        .arg(file.path())
        .status()
        .with_context(|| format!("failed to launch {editor}"))?;
    if !status.success() {
        bail!("{editor} exited with {status}");
    }

    let edited = std::fs::read_to_string(file.path())?;
    if Sha256::digest(edited.as_bytes()) == Sha256::digest(original.as_bytes()) {
        println!("no changes");
        return Ok(());
    }

    let entity: Entity = serde_yaml::from_str(&edited).context("edited YAML is not an entity")?;
    client.push(vec![entity]).await?;
    println!("updated {id}");
    Ok(())
}

pub async fn run_rm(client: &Client, id: &str) -> Result<()> {
    let mut entity = client.get(id).await?;
    expire_now(&mut entity);
    client.push(vec![entity]).await?;
    println!("removed {id}");
    Ok(())
}

pub async fn run_clear(client: &Client) -> Result<()> {
    let mut entities = client.list(None).await?;
    if entities.is_empty() {
        println!("nothing to remove");
        return Ok(());
    }

    for entity in &mut entities {
        expire_now(entity);
    }
    let count = entities.len();
    client.push(entities).await?;
    println!("removed {count} entities");
    Ok(())
}

fn expire_now(entity: &mut Entity) {
    let lifetime = entity.lifetime.get_or_insert_with(Lifetime::default);
    lifetime.until = Some(Utc::now());
}

pub async fn run_debug(client: &Client) -> Result<()> {
    let mut stream = client.watch(&WatchRequest::default()).await?;
    print_frames(&mut stream).await
}

pub async fn run_observe(client: &Client) -> Result<()> {
    let mut stream = client.observe().await?;
    print_frames(&mut stream).await
}

/// Print every text frame as one JSON line until the stream closes.
async fn print_frames(stream: &mut crate::cli::client::WsStream) -> Result<()> {
    while let Some(msg) = stream.next().await {
        match msg? {
            Message::Text(text) => println!("{text}"),
            Message::Close(_) => break,
            _ => {}
        }
    }
    Ok(())
}
