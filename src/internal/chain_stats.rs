#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::arithmetic_side_effects)]
#![allow(clippy::indexing_slicing)]
#![allow(clippy::cast_precision_loss)]

use chainhash::{ChainedHashMap, HashMapExtensions, MAX_LOAD_FACTOR};
use plotters::prelude::*;
use rand::Rng;

// Number of random keys inserted in each run
const KEY_COUNTS: [usize; 8] = [10, 100, 1_000, 5_000, 10_000, 50_000, 100_000, 250_000];
// Record the load factor after every this many inserts
const SAMPLE_EVERY: usize = 100;

struct RunStats {
    keys: usize,
    bucket_count: usize,
    load_factor: f64,
    longest_chain: usize,
    rehashes: usize,
    histogram: Vec<usize>,
    // (keys inserted, load factor) samples
    load_trace: Vec<(usize, f64)>,
}

fn run(keys: &[u64]) -> Result<RunStats, Box<dyn std::error::Error>> {
    let mut map = ChainedHashMap::default();
    let mut rehashes = 0;
    let mut load_trace = Vec::with_capacity(keys.len() / SAMPLE_EVERY + 1);

    for (inserted, &key) in keys.iter().enumerate() {
        let before = map.bucket_count();
        map.set(key, ())?;
        if map.bucket_count() != before {
            rehashes += 1;
        }
        if inserted % SAMPLE_EVERY == 0 {
            load_trace.push((inserted + 1, map.load_factor()));
        }
    }

    Ok(RunStats {
        keys: keys.len(),
        bucket_count: map.bucket_count(),
        load_factor: map.load_factor(),
        longest_chain: map.longest_chain(),
        rehashes,
        histogram: map.chain_length_histogram(),
        load_trace,
    })
}

fn plot_load_factor(stats: &RunStats) -> Result<(), Box<dyn std::error::Error>> {
    let font_family = "sans-serif";
    let root = BitMapBackend::new("load_factor.png", (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Load Factor While Inserting {} Keys", stats.keys),
            (font_family, 35),
        )
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(60)
        .right_y_label_area_size(10)
        .build_cartesian_2d(0..stats.keys, 0.0..1.0)?;

    chart
        .configure_mesh()
        .x_desc("Number of Keys Inserted")
        .y_desc("Used Buckets / Bucket Count")
        .axis_desc_style((font_family, 16))
        .draw()?;

    let threshold_style = ShapeStyle::from(&RED.mix(0.5)).stroke_width(1);
    chart
        .draw_series(LineSeries::new(
            vec![(0, MAX_LOAD_FACTOR), (stats.keys, MAX_LOAD_FACTOR)],
            threshold_style,
        ))?
        .label("Rehash Threshold")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], threshold_style));

    let line_style = ShapeStyle::from(&RGBColor(50, 90, 220)).stroke_width(2);
    chart
        .draw_series(LineSeries::new(stats.load_trace.iter().copied(), line_style))?
        .label("Load Factor")
        .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], line_style));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .position(SeriesLabelPosition::LowerRight)
        .draw()?;

    root.present()?;
    Ok(())
}

fn plot_chain_lengths(stats: &RunStats) -> Result<(), Box<dyn std::error::Error>> {
    let font_family = "sans-serif";
    let root = BitMapBackend::new("chain_lengths.png", (1200, 800)).into_drawing_area();
    root.fill(&WHITE)?;

    let max_buckets = stats.histogram.iter().copied().max().unwrap_or(0) + 1;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Chain Lengths Across {} Buckets", stats.bucket_count),
            (font_family, 35),
        )
        .margin(15)
        .x_label_area_size(60)
        .y_label_area_size(80)
        .build_cartesian_2d(0..stats.histogram.len(), 0..max_buckets)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_desc("Chain Length")
        .y_desc("Buckets")
        .axis_desc_style((font_family, 16))
        .draw()?;

    chart.draw_series(stats.histogram.iter().enumerate().map(|(length, &buckets)| {
        Rectangle::new([(length, 0), (length + 1, buckets)], RGBColor(50, 180, 50).mix(0.7).filled())
    }))?;

    root.present()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Generate random keys once so every run sees the same prefix
    let mut rng = rand::rng();
    let max_keys = KEY_COUNTS.iter().copied().max().unwrap_or(0);
    let keys: Vec<u64> = (0..max_keys).map(|_| rng.random()).collect();

    let mut largest = None;
    for &n_keys in &KEY_COUNTS {
        let stats = run(&keys[..n_keys])?;
        println!(
            "{:>7} keys: {:>7} buckets, load factor {:.3}, longest chain {}, {} rehashes",
            stats.keys, stats.bucket_count, stats.load_factor, stats.longest_chain, stats.rehashes
        );
        largest = Some(stats);
    }

    if let Some(stats) = largest {
        plot_load_factor(&stats)?;
        plot_chain_lengths(&stats)?;
        println!("Generated plot images: load_factor.png, chain_lengths.png");
    }

    Ok(())
}
