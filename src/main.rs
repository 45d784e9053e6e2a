// This file is now an example of how to use the `zone_tiler` library.
// The main library entry point is `src/lib.rs`.

fn main() {
    println!("Zone Tiler Engine - Example Runner");
    // In a real application, you would load a floorplan image, build a
    // config, and process it with your zone detector here.
    //
    // Example:
    // let config = zone_tiler::config::TilingConfig::default();
    // let processor = zone_tiler::pipeline::TileProcessor::new(config)?;
    // let image = load_floorplan("warehouse.png");
    // let zones = processor.process(&image, detector, None, true).await;
    // println!("Zones: {:?}", zones);
}
