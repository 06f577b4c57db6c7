use super::*;

use serde_json::json;

use crate::model::design::split_design_formula;
use crate::notify::tests::RecordingNotifier;

struct Fixture {
    _dir: tempfile::TempDir,
    conditions: PathBuf,
    counts: PathBuf,
    output: PathBuf,
    config: EngineConfig,
}

/// A `sh` stand-in for the statistics engine running `body`.
fn fixture(body: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let conditions = dir.path().join("conditions.csv");
    let counts = dir.path().join("counts.csv");
    fs::write(&conditions, "sample_id,condition\nS1,A\n").unwrap();
    fs::write(&counts, "gene_id,S1\nG1,1\n").unwrap();

    let engine_dir = dir.path().join("engine");
    fs::create_dir(&engine_dir).unwrap();
    fs::write(engine_dir.join("fake_engine.sh"), body).unwrap();

    Fixture {
        conditions,
        counts,
        output: dir.path().join("res"),
        config: EngineConfig {
            program: "sh".to_string(),
            script: Some(PathBuf::from("fake_engine.sh")),
            working_dir: engine_dir,
        },
        _dir: dir,
    }
}

fn run(fixture: &Fixture, notifier: &RecordingNotifier) -> (Result<(), EngineError>, String) {
    let design = split_design_formula(&[
        ("condition".to_string(), "explanatory".to_string()),
        ("batch".to_string(), "confounding".to_string()),
    ])
    .unwrap();
    let invocation = EngineInvocation {
        conditions_path: &fixture.conditions,
        sample_id_column: "sample_id",
        design: &design,
        counts_path: &fixture.counts,
        gene_id_column: "gene_id",
        highlighted_genes: &[],
        top_genes: 30,
        output_dir: &fixture.output,
    };
    let mut log = Vec::new();
    let result = run_engine(&fixture.config, &invocation, notifier, &mut log);
    (result, String::from_utf8(log).unwrap())
}

#[test]
fn test_classify_sentinel_lines() {
    assert_eq!(
        classify_line("__LATCH_MESSAGE_DATA progress {\"step\": 2, \"of\": 5}\n"),
        EngineLine::Message {
            message_type: "progress",
            payload: json!({"step": 2, "of": 5}),
        }
    );
    assert_eq!(
        classify_line("fitting model\n"),
        EngineLine::Log("fitting model\n")
    );
    assert!(matches!(
        classify_line("__LATCH_MESSAGE_DATA progress {oops"),
        EngineLine::Malformed(_)
    ));
    assert!(matches!(
        classify_line("__LATCH_MESSAGE_DATA"),
        EngineLine::Malformed(_)
    ));
}

#[test]
fn test_args_in_wire_order() {
    let f = fixture("");
    prepare_output_dir(&f.output).unwrap();
    let design = split_design_formula(&[
        ("Condition".to_string(), "explanatory".to_string()),
        ("Batch".to_string(), "confounding".to_string()),
        ("Subject".to_string(), "cluster".to_string()),
    ])
    .unwrap();
    let highlighted = vec!["TP53".to_string(), "MYC".to_string()];
    let invocation = EngineInvocation {
        conditions_path: &f.conditions,
        sample_id_column: "Sample",
        design: &design,
        counts_path: &f.counts,
        gene_id_column: "Geneid",
        highlighted_genes: &highlighted,
        top_genes: 12,
        output_dir: &f.output,
    };

    let args: Vec<String> = invocation
        .args()
        .unwrap()
        .into_iter()
        .map(|a| a.into_string().unwrap())
        .collect();
    assert_eq!(args.len(), 10);
    assert!(Path::new(&args[0]).is_absolute());
    assert!(args[0].ends_with("conditions.csv"));
    assert_eq!(&args[1..5], ["Sample", "Condition", "Batch", "Subject"]);
    assert!(args[5].ends_with("counts.csv"));
    assert_eq!(&args[6..9], ["Geneid", "TP53,MYC", "12"]);
    assert!(args[9].ends_with("res"));
}

#[cfg(unix)]
#[test]
fn test_engine_messages_and_logs_are_split() {
    let f = fixture(
        r#"printf '%s\n' "$@" > "${10}/Data/args.txt"
echo "loading counts"
echo '__LATCH_MESSAGE_DATA progress {"step":1}'
echo '__LATCH_MESSAGE_DATA progress not-json'
echo "done"
"#,
    );
    let notifier = RecordingNotifier::default();

    let (result, log) = run(&f, &notifier);
    result.unwrap();
    assert_eq!(log, "loading counts\ndone\n");
    assert_eq!(
        *notifier.messages.borrow(),
        vec![("progress".to_string(), json!({"step": 1}))]
    );

    for sub in OUTPUT_SUBDIRS {
        assert!(f.output.join(sub).is_dir(), "{sub}");
    }
    let args = fs::read_to_string(f.output.join("Data/args.txt")).unwrap();
    let args: Vec<&str> = args.lines().collect();
    assert_eq!(args[1..5], ["sample_id", "condition", "batch", ""]);
    assert_eq!(args[6..9], ["gene_id", "", "30"]);
}

#[cfg(unix)]
#[test]
fn test_nonzero_exit_is_fatal() {
    let f = fixture("echo partial\nexit 3\n");
    let notifier = RecordingNotifier::default();

    let (result, log) = run(&f, &notifier);
    let err = result.unwrap_err();
    assert!(matches!(err, EngineError::Failed { code: Some(3) }));
    assert_eq!(log, "partial\n");

    let notice = err.notice().unwrap();
    assert_eq!(notice.title, "R script failed");
    assert_eq!(notice.body, "The DESeq2 run failed");
}

#[cfg(unix)]
#[test]
fn test_empty_output_is_fatal() {
    let f = fixture("echo nothing to see\n");
    let (result, _) = run(&f, &RecordingNotifier::default());
    let err = result.unwrap_err();
    assert!(matches!(err, EngineError::NoOutputs(_)));
    assert_eq!(err.notice().unwrap().title, "R script produced no outputs");
}

#[test]
fn test_missing_program_is_spawn_error() {
    let mut f = fixture("");
    f.config.program = "definitely-not-an-engine-binary".to_string();
    let (result, _) = run(&f, &RecordingNotifier::default());
    assert!(matches!(result.unwrap_err(), EngineError::Spawn { .. }));
}

#[test]
fn test_has_regular_file_recurses() {
    let dir = tempfile::tempdir().unwrap();
    prepare_output_dir(dir.path()).unwrap();
    assert!(!has_regular_file(dir.path()).unwrap());
    fs::write(dir.path().join("Plots/QC/PCA/p.html"), "x").unwrap();
    assert!(has_regular_file(dir.path()).unwrap());
}
