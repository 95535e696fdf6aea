use spam_screener::classification::{HAM, PipelineSettings, SPAM, TrainedPipeline};
use spam_screener::store::ModelStore;

fn spec_corpus() -> (Vec<String>, Vec<u8>) {
    let texts = vec![
        "free money now".to_string(),
        "meeting at noon".to_string(),
        "win cash prize".to_string(),
        "project update attached".to_string(),
    ];
    let labels = vec![SPAM, HAM, SPAM, HAM];
    (texts, labels)
}

fn larger_corpus() -> (Vec<String>, Vec<u8>) {
    let rows = [
        ("free money now, claim your prize", SPAM),
        ("win cash instantly, limited offer", SPAM),
        ("cheap pills, no prescription needed", SPAM),
        ("you have been selected for a reward", SPAM),
        ("meeting moved to noon tomorrow", HAM),
        ("project update attached, please review", HAM),
        ("lunch on thursday with the design team", HAM),
        ("quarterly report draft for your comments", HAM),
    ];
    let texts = rows.iter().map(|(text, _)| (*text).to_string()).collect();
    let labels = rows.iter().map(|(_, label)| *label).collect();
    (texts, labels)
}

#[test]
fn spam_scenario_classifies_as_expected() {
    let (texts, labels) = spec_corpus();
    let (pipeline, report) =
        TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");
    assert!(report.train_accuracy >= 0.99);

    let queries = vec![
        "limited time offer, win now".to_string(),
        "see you at the meeting".to_string(),
    ];
    let predictions = pipeline.predict_with_confidence(&queries);

    assert_eq!(predictions[0].label, SPAM);
    assert!(predictions[0].confidence > 0.5);
    assert_eq!(predictions[1].label, HAM);
    assert!(predictions[1].confidence > 0.5);
}

#[test]
fn roundtrip_through_store_does_not_degrade_accuracy() {
    let (texts, labels) = larger_corpus();
    let (pipeline, report) =
        TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");

    let dir = tempfile::tempdir().expect("tempdir");
    let store = ModelStore::new(dir.path().join("spam_model.json"));
    store.save(&pipeline).expect("save");
    let loaded = store.load().expect("load");

    let predictions = loaded.predict(&texts);
    let correct = predictions
        .iter()
        .zip(labels.iter())
        .filter(|(predicted, expected)| predicted == expected)
        .count();
    #[allow(clippy::cast_precision_loss)]
    let accuracy = correct as f32 / labels.len() as f32;
    let fit_accuracy = report.train_accuracy;
    assert!(
        accuracy >= fit_accuracy,
        "accuracy after reload {accuracy} must not drop below {fit_accuracy}",
    );
}

#[test]
fn loaded_pipeline_predicts_identically_to_fitted_one() {
    let (texts, labels) = larger_corpus();
    let (pipeline, _) =
        TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");

    let dir = tempfile::tempdir().expect("tempdir");
    let store = ModelStore::new(dir.path().join("spam_model.json"));
    store.save(&pipeline).expect("save");
    let loaded = store.load().expect("load");

    let queries = vec![
        "exclusive cash reward for you".to_string(),
        "agenda for the quarterly review".to_string(),
        "".to_string(),
    ];
    assert_eq!(pipeline.predict(&queries), loaded.predict(&queries));
    assert_eq!(loaded.model_id(), pipeline.model_id());
}

#[test]
fn predict_is_stable_across_calls() {
    let (texts, labels) = larger_corpus();
    let (pipeline, _) =
        TrainedPipeline::fit(PipelineSettings::default(), &texts, &labels).expect("fit");
    let queries = vec![
        "win a free cruise".to_string(),
        "minutes from the standup".to_string(),
    ];
    assert_eq!(pipeline.predict(&queries), pipeline.predict(&queries));
}
