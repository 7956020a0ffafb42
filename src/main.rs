use anyhow::Result;
use oetl::OsmETL;
use std::path::PathBuf;

const DEFAULT_INPUT: &str = "./data/map.osm";
const DEFAULT_OUT: &str = "./etl_out";

fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_INPUT));
    let out_dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from(DEFAULT_OUT));

    let summary = OsmETL::new()
        .input(&input)
        .out_dir(&out_dir)
        .sample(10, 5_000)
        .progress(true)
        .progress_label("Shaping")
        .run()?;

    let c = summary.counts;
    println!("nodes:      {}", c.nodes);
    println!("nodes_tags: {}", c.node_tags);
    println!("ways:       {}", c.ways);
    println!("ways_nodes: {}", c.way_nodes);
    println!("ways_tags:  {}", c.way_tags);
    println!(
        "dropped tags (malformed keys): {}, unknown values: {}",
        summary.stats.malformed_keys, summary.stats.unknown_values
    );
    Ok(())
}
