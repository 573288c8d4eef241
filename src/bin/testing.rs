use rusty_trees::data::dataset::Dataset;
use rusty_trees::metrics::confusion::ClassificationMetrics;
use rusty_trees::trees::classifier::DecisionTreeClassifier;
use std::error::Error;
use std::process;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = std::env::args().collect::<Vec<_>>();
    if args.len() < 3 {
        eprintln!("usage: test-tree <csv-path> <n-features> [max-depth]");
        process::exit(2);
    }

    let path = &args[1];
    let n_features = args[2].parse::<usize>()?;
    let max_depth = args.get(3).map(|depth| depth.parse::<u16>()).transpose()?;

    let dataset = Dataset::from_csv(path, n_features, true)?;
    let (train, test) = dataset.train_test_split(0.8, Some(42))?;

    let mut classifier = DecisionTreeClassifier::with_params(max_depth);
    classifier.fit(&train)?;

    let predictions = classifier.predict(&test.x)?;
    let accuracy = classifier.accuracy(&test.y, &predictions)?;
    println!(
        "decision tree accuracy: {:.4} on {} test rows",
        accuracy,
        test.nrows()
    );

    Ok(())
}
