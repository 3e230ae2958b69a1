use backcast::aggregate::{AggregationSpec, MetricsReduction, PlotSelection};
use backcast::config::ExecutionMode;
use backcast::data::{Granularity, TimeSeriesData};
use backcast::metrics::MetricSet;
use backcast::models::{ExponentialSmoothing, Naive, SimpleMovingAverage};
use backcast::plot::CsvPlotter;
use backcast::transform::StandardScaler;
use backcast::Backtester;
use chrono::{Months, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "backcast=info".into()),
        )
        .init();

    println!("Backcast: Rolling Backtest Example");
    println!("==================================\n");

    let series = create_sample_monthly_data(120)?;
    println!("Sample data created: {} monthly points\n", series.len());

    let metrics = MetricSet::from_names(&["mae", "rmse", "smape"])?;
    let plot_dir = std::env::temp_dir().join("backcast_plots");
    std::fs::create_dir_all(&plot_dir)?;

    // Fold-level results for a naive baseline
    let baseline = Backtester::new(Naive::new())
        .test_window(12)
        .train_window(36)
        .step_size(6)
        .with_metrics(metrics.clone())
        .with_granularity(Granularity::Month);

    println!("Naive baseline, sliding 36-month training window:");
    for fold in baseline.run_folds(&series)? {
        print!("{}", fold);
    }

    // Aggregated comparison of the smoothing models
    let spec = AggregationSpec::new()
        .with_metrics(MetricsReduction::from_names(&["avg", "median", "std"])?)
        .with_plot(PlotSelection::Representative);

    let ses = Backtester::new(ExponentialSmoothing::new(0.3)?)
        .with_transformer(StandardScaler::new())
        .test_window(12)
        .step_size(6)
        .with_metrics(metrics.clone())
        .with_aggregation(spec.clone())
        .with_plotter(CsvPlotter::new(&plot_dir).with_prefix("ses"))
        .with_execution(ExecutionMode::Parallel)
        .with_run_id("expanding");

    let sma = Backtester::new(SimpleMovingAverage::new(6)?)
        .test_window(12)
        .train_window(48)
        .step_size(6)
        .with_metrics(metrics)
        .with_aggregation(spec)
        .with_execution(ExecutionMode::Parallel);

    println!("\nExponential smoothing, expanding window:");
    for summary in ses.run(&series)?.aggregated().unwrap_or_default() {
        print!("{}", summary);
    }

    println!("\nMoving average, sliding 48-month training window:");
    let output = sma.run(&series)?;
    for summary in output.aggregated().unwrap_or_default() {
        print!("{}", summary);
    }

    let report = plot_dir.join("sma_report.json");
    output.save_json(&report)?;
    println!("\nReport saved to {}", report.display());

    Ok(())
}

/// Trend plus yearly seasonality plus noise
fn create_sample_monthly_data(n: usize) -> Result<TimeSeriesData, Box<dyn std::error::Error>> {
    let start = Utc.with_ymd_and_hms(2014, 1, 1, 0, 0, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(42);
    let noise = Normal::new(0.0, 3.0)?;

    let mut dates = Vec::with_capacity(n);
    let mut values = Vec::with_capacity(n);
    for i in 0..n {
        let date = start
            .checked_add_months(Months::new(i as u32))
            .ok_or("date overflow")?;
        let season = 10.0 * (2.0 * std::f64::consts::PI * i as f64 / 12.0).sin();
        dates.push(date);
        values.push(200.0 + 0.8 * i as f64 + season + noise.sample(&mut rng));
    }

    Ok(TimeSeriesData::new(dates, values)?)
}
