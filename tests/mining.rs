//! End-to-end mining runs through the public API: file in, two relations
//! out.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use assert_matches::assert_matches;
use maplit::hashmap;

use logsieve::{
    errors::Error, parse, Algorithm, Column, MemoryStore, ParseJob, ParserConfig, Table,
    TableStore, EVENT_TEMPLATE, LINE_ID, OCCURRENCES, PARAMETER_LIST,
};

fn fixture(content: &str) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("input.log");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    (dir, path)
}

static NEVER_STOP: fn() -> bool = || false;

fn job(file: &PathBuf, keep_params: bool) -> ParseJob<'_> {
    ParseJob {
        file,
        structured_name: "structured",
        templates_name: "templates",
        keep_params,
        should_stop: &NEVER_STOP,
        progress: None,
    }
}

fn occurrences(table: &Table) -> std::collections::HashMap<String, u64> {
    let Some(Column::Str(templates)) = table.column(EVENT_TEMPLATE) else {
        panic!("missing {EVENT_TEMPLATE} column");
    };
    let Some(Column::Int(counts)) = table.column(OCCURRENCES) else {
        panic!("missing {OCCURRENCES} column");
    };
    templates
        .iter()
        .cloned()
        .zip(counts.iter().copied())
        .collect()
}

#[test]
fn drain_happy_path() {
    let (_dir, file) = fixture("A 1 stop\nA 2 stop\nA 3 stop\n");
    // the leading fields are headers, the verb is the mined payload
    let mut config = ParserConfig::bare("test", "<Token> <Num> <Content>");
    config.use_builtin_masking = false;
    config.drain.depth = 3;
    config.drain.sim_thr = 0.5;

    let store = MemoryStore::new();
    let result = parse(Algorithm::Drain, &config, &job(&file, false), &store).unwrap();
    assert_eq!(result.line_count, 3);

    let structured = store.get("structured").unwrap();
    assert_eq!(
        structured.column("Token"),
        Some(&Column::Str(vec!["A".to_owned(); 3]))
    );
    let templates = store.get("templates").unwrap();
    assert_eq!(templates.len(), 1);
}

#[test]
fn drain_full_content_scenario() {
    let (_dir, file) = fixture("A 1 stop\nA 2 stop\nA 3 stop\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.use_builtin_masking = false;
    config.drain.depth = 3;
    config.drain.sim_thr = 0.5;

    let store = MemoryStore::new();
    parse(Algorithm::Drain, &config, &job(&file, false), &store).unwrap();

    assert_eq!(
        occurrences(&store.get("templates").unwrap()),
        hashmap! { "A <*> stop".to_owned() => 3 }
    );
}

#[test]
fn drain_branching_scenario() {
    let (_dir, file) = fixture("A 1 stop\nA 2 stop\nA 3 stop\nB 9 go\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.use_builtin_masking = false;
    config.drain.depth = 3;
    config.drain.sim_thr = 0.5;

    let store = MemoryStore::new();
    parse(Algorithm::Drain, &config, &job(&file, false), &store).unwrap();

    assert_eq!(
        occurrences(&store.get("templates").unwrap()),
        hashmap! {
            "A <*> stop".to_owned() => 3,
            "B 9 go".to_owned() => 1,
        }
    );
}

#[test]
fn spell_lcs_merging_scenario() {
    let (_dir, file) = fixture("start job 10\nstart job 11 now\nstart job\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.use_builtin_masking = false;
    config.spell.sim_thr = 0.5;

    let store = MemoryStore::new();
    parse(Algorithm::Spell, &config, &job(&file, false), &store).unwrap();

    assert_eq!(
        occurrences(&store.get("templates").unwrap()),
        hashmap! { "start job <*>".to_owned() => 3 }
    );
}

#[test]
fn ael_binning_scenario() {
    let (_dir, file) = fixture("x 1 y\nx 2 y\nx 3 y\nx 4 y\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.ael.log_cluster_thr = 2;
    config.ael.merge_thr = 1.0;

    let store = MemoryStore::new();
    parse(Algorithm::Ael, &config, &job(&file, false), &store).unwrap();

    // builtin masking collapses the digits into one sentinel
    assert_eq!(
        occurrences(&store.get("templates").unwrap()),
        hashmap! { "x <§NUM§> y".to_owned() => 4 }
    );
}

#[test]
fn brain_column_split_scenario() {
    let (_dir, file) = fixture("open 1 ok\nopen 2 ok\nopen 3 ok\nclose 4 ok\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.use_builtin_masking = false;
    config.brain.var_thr = 3;

    let store = MemoryStore::new();
    parse(Algorithm::Brain, &config, &job(&file, false), &store).unwrap();

    assert_eq!(
        occurrences(&store.get("templates").unwrap()),
        hashmap! {
            "open <*> ok".to_owned() => 3,
            "close <*> ok".to_owned() => 1,
        }
    );
}

#[test]
fn parameter_extraction_scenario() {
    let (_dir, file) = fixture("user alice from 10.0.0.1\nuser bob from 10.0.0.2\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.use_builtin_masking = false;
    config.drain.depth = 3;
    config.drain.sim_thr = 0.5;

    let store = MemoryStore::new();
    parse(Algorithm::Drain, &config, &job(&file, true), &store).unwrap();

    let structured = store.get("structured").unwrap();
    assert_eq!(
        structured.column(EVENT_TEMPLATE),
        Some(&Column::Str(vec![
            "user <*> from <*>".to_owned(),
            "user <*> from <*>".to_owned(),
        ]))
    );
    assert_eq!(
        structured.column(PARAMETER_LIST),
        Some(&Column::StrList(vec![
            vec!["alice".to_owned(), "10.0.0.1".to_owned()],
            vec!["bob".to_owned(), "10.0.0.2".to_owned()],
        ]))
    );
}

#[test]
fn occurrence_sum_equals_line_count_for_every_miner() {
    let content = "get page 1 done\nget page 2 done\nput page 3 done\nrestart now\n\
                   get page 9 done\nrestart now\n";
    for &algorithm in Algorithm::ALL {
        let (_dir, file) = fixture(content);
        let config = ParserConfig::bare("test", "<Content>");
        let store = MemoryStore::new();
        let result = parse(algorithm, &config, &job(&file, false), &store)
            .unwrap_or_else(|e| panic!("{algorithm} failed: {e}"));
        assert_eq!(result.line_count, 6);

        let Some(Column::Int(counts)) = store.get("templates").unwrap().column(OCCURRENCES).cloned()
        else {
            panic!("missing occurrences");
        };
        assert_eq!(
            counts.iter().sum::<u64>(),
            6,
            "occurrence law violated by {algorithm}"
        );
        // descending order
        assert!(counts.windows(2).all(|pair| pair[0] >= pair[1]));
    }
}

#[test]
fn arity_is_preserved_by_fixed_arity_miners() {
    let content = "alpha beta 1\nalpha beta 2\nalpha gamma 3 extra\n";
    for algorithm in [Algorithm::Drain, Algorithm::Spell, Algorithm::Ael, Algorithm::Brain] {
        let (_dir, file) = fixture(content);
        let mut config = ParserConfig::bare("test", "<Content>");
        config.use_builtin_masking = false;
        let store = MemoryStore::new();
        parse(algorithm, &config, &job(&file, false), &store).unwrap();

        let structured = store.get("structured").unwrap();
        let Some(Column::Str(contents)) = structured.column("Content") else {
            panic!("missing Content");
        };
        let Some(Column::Str(templates)) = structured.column(EVENT_TEMPLATE) else {
            panic!("missing EventTemplate");
        };
        for (content, template) in contents.iter().zip(templates) {
            let content_tokens: Vec<&str> = content.split_whitespace().collect();
            let template_tokens: Vec<&str> = template.split_whitespace().collect();
            assert_eq!(
                content_tokens.len(),
                template_tokens.len(),
                "{algorithm} broke arity: {content:?} vs {template:?}"
            );
            // token equality law at constant positions
            for (actual, expected) in content_tokens.iter().zip(&template_tokens) {
                if *expected != "<*>" {
                    assert_eq!(actual, expected, "{algorithm} rewrote a constant");
                }
            }
        }
    }
}

#[test]
fn batch_miners_are_deterministic() {
    let content = "a p z\nb r z\na q z\nc s z\na p z\nopen 1\nclose 2\n";
    for algorithm in [Algorithm::Ael, Algorithm::Brain] {
        let run = || {
            let (_dir, file) = fixture(content);
            let config = ParserConfig::bare("test", "<Content>");
            let store = MemoryStore::new();
            parse(algorithm, &config, &job(&file, false), &store).unwrap();
            occurrences(&store.get("templates").unwrap())
        };
        assert_eq!(run(), run(), "{algorithm} is not deterministic");
    }
}

#[test]
fn header_fields_survive_into_structured_relation() {
    let (_dir, file) = fixture(
        "081109 203615 INFO dfs.DataNode: Receiving block blk_1\n\
         081109 203807 WARN dfs.DataNode: Dropping block blk_2\n\
         this line does not match\n",
    );
    let config = ParserConfig::bare("test", "<Date> <Time> <Level> <Component>: <Content>");
    let store = MemoryStore::new();
    let result = parse(Algorithm::Drain, &config, &job(&file, false), &store).unwrap();
    // the garbage line is skipped and does not consume a line id
    assert_eq!(result.line_count, 2);

    let structured = store.get("structured").unwrap();
    assert_eq!(structured.column(LINE_ID), Some(&Column::Int(vec![1, 2])));
    assert_eq!(
        structured.column("Level"),
        Some(&Column::Str(vec!["INFO".to_owned(), "WARN".to_owned()]))
    );
    assert_eq!(
        structured.column("Component"),
        Some(&Column::Str(vec![
            "dfs.DataNode".to_owned(),
            "dfs.DataNode".to_owned()
        ]))
    );
}

#[test]
fn cancellation_publishes_nothing() {
    let (_dir, file) = fixture("A 1\nA 2\n");
    let config = ParserConfig::bare("test", "<Content>");
    let store = MemoryStore::new();

    let cancelled = ParseJob {
        should_stop: &|| true,
        ..job(&file, false)
    };
    assert_matches!(
        parse(Algorithm::Drain, &config, &cancelled, &store),
        Err(Error::Cancelled)
    );
    assert!(store.table_names().is_empty());
}

#[test]
fn output_conflict_is_refused_without_partial_write() {
    let (_dir, file) = fixture("A 1\n");
    let config = ParserConfig::bare("test", "<Content>");
    let store = MemoryStore::new();
    parse(Algorithm::Drain, &config, &job(&file, false), &store).unwrap();

    assert_matches!(
        parse(Algorithm::Drain, &config, &job(&file, false), &store),
        Err(Error::OutputConflict(_))
    );
    // only the first run's two tables exist
    assert_eq!(store.table_names().len(), 2);
}

#[test]
fn bad_format_fails_the_job() {
    let (_dir, file) = fixture("A 1\n");
    let config = ParserConfig::bare("test", "<Date> <Time>");
    let store = MemoryStore::new();
    assert_matches!(
        parse(Algorithm::Drain, &config, &job(&file, false), &store),
        Err(Error::Frontend(_))
    );
    assert!(store.table_names().is_empty());
}

#[test]
fn progress_reaches_one_hundred() {
    let mut content = String::new();
    for i in 0..12_000 {
        content.push_str(&format!("evt {} done\n", i % 5));
    }
    let (_dir, file) = fixture(&content);
    let config = ParserConfig::bare("test", "<Content>");
    let store = MemoryStore::new();

    let seen = Mutex::new(Vec::new());
    let calls = AtomicUsize::new(0);
    let progress = |percent: u8| {
        calls.fetch_add(1, Ordering::Relaxed);
        seen.lock().unwrap().push(percent);
    };
    let with_progress = ParseJob {
        progress: Some(&progress),
        ..job(&file, false)
    };
    parse(Algorithm::Drain, &config, &with_progress, &store).unwrap();

    let seen = seen.lock().unwrap();
    assert!(calls.load(Ordering::Relaxed) >= 2);
    assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    assert_eq!(*seen.last().unwrap(), 100);
    assert!(seen.iter().all(|pct| *pct <= 100));
}

#[test]
fn jaccard_drain_end_to_end() {
    let (_dir, file) = fixture("conn from hostA\nconn from hostB\nconn from hostC\n");
    let mut config = ParserConfig::bare("test", "<Content>");
    config.use_builtin_masking = false;
    config.jaccard_drain.sim_thr = 0.5;

    let store = MemoryStore::new();
    parse(Algorithm::JaccardDrain, &config, &job(&file, false), &store).unwrap();

    assert_eq!(
        occurrences(&store.get("templates").unwrap()),
        hashmap! { "conn from <*>".to_owned() => 3 }
    );
}
