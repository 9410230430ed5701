#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sift_chain::explorer::{Explorer, ExplorerConfig};
use sift_chain::persist::MemoryStore;
use sift_chain::shape::{ColumnType, Shape};
use sift_chain::translate::{TranslateError, Translation, Translator};
use sift_chain::SqliteEngine;

/// Five applications: two certified, one denied, one withdrawn, one certified in NY.
pub const FIXTURE_ROWS: &str = "
INSERT INTO h1b VALUES ('Acme Corp', 'Software Engineer', 'CA', 'San Jose', 150000, 'Certified', 1, 0, 1);
INSERT INTO h1b VALUES ('Acme Corp', 'Data Scientist', 'CA', 'Palo Alto', 140000, 'Denied', 0, 1, 1);
INSERT INTO h1b VALUES ('Globex', 'Software Engineer', 'WA', 'Seattle', 120000, 'Certified', 1, 0, 2);
INSERT INTO h1b VALUES ('O''Brien & Sons', 'Analyst', 'NY', 'New York', 90000, 'Withdrawn', 0, 1, 1);
INSERT INTO h1b VALUES ('Initech 100%', 'Analyst_2', 'NY', 'Albany', 85000, 'Certified', 1, 0, 1);
";

pub fn seeded_engine() -> SqliteEngine {
    let engine = SqliteEngine::in_memory().unwrap();
    engine.ensure_base_table().unwrap();
    engine.execute_batch(FIXTURE_ROWS).unwrap();
    engine
}

pub fn shape(columns: &[(&str, ColumnType)]) -> Shape {
    columns.iter().map(|(name, ty)| (*name, ty.clone())).collect()
}

pub fn generated(fragment: &str, columns: &[(&str, ColumnType)]) -> Translation {
    Translation::Generated {
        fragment: fragment.to_string(),
        shape: shape(columns),
    }
}

/// Translator that replays canned answers in order and records what it was asked.
#[derive(Default)]
pub struct ScriptedTranslator {
    answers: Mutex<VecDeque<Result<Translation, TranslateError>>>,
    calls: Mutex<Vec<(String, String)>>,
}

impl ScriptedTranslator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, answer: Translation) {
        self.answers.lock().unwrap().push_back(Ok(answer));
    }

    pub fn push_err(&self, err: TranslateError) {
        self.answers.lock().unwrap().push_back(Err(err));
    }

    /// `(prompt, parent shape description)` for every call so far.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Translator for ScriptedTranslator {
    async fn translate(&self, prompt: &str, parent_shape: &str) -> Result<Translation, TranslateError> {
        self.calls
            .lock()
            .unwrap()
            .push((prompt.to_string(), parent_shape.to_string()));
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TranslateError::Service("script exhausted".to_string())))
    }
}

pub struct Harness {
    pub explorer: Explorer,
    pub translator: Arc<ScriptedTranslator>,
    pub blobs: MemoryStore,
}

pub fn harness() -> Harness {
    harness_with(ExplorerConfig::default())
}

pub fn harness_with(config: ExplorerConfig) -> Harness {
    let translator = ScriptedTranslator::new();
    let blobs = MemoryStore::new();
    let explorer = Explorer::open(
        Arc::new(seeded_engine()),
        translator.clone(),
        Arc::new(blobs.clone()),
        config,
    );
    Harness {
        explorer,
        translator,
        blobs,
    }
}
