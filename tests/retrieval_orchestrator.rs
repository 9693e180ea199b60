//! Retrieval orchestrator behavior against mocked capabilities

use async_trait::async_trait;
use serde_json::{Value, json};
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::{Arc, Mutex};

use themis::retrieval::{
    KeywordDecision, KeywordExtractor, RagRetriever, RetrievalOrchestrator, WebSearchBackend,
    WebSearchItem,
};
use themis::store::{QuestionContent, QuestionRecord, Store};

struct StaticExtractor {
    related: bool,
    keywords: Vec<String>,
    fail: bool,
}

#[async_trait]
impl KeywordExtractor for StaticExtractor {
    async fn classify(&self, _text: &str) -> anyhow::Result<KeywordDecision> {
        if self.fail {
            anyhow::bail!("extraction backend unavailable");
        }
        Ok(KeywordDecision {
            related: self.related,
            keywords: self.keywords.clone(),
        })
    }
}

/// Records every query it is asked to run
struct RecordingWeb {
    queries: Mutex<Vec<String>>,
    results: Vec<Value>,
    fail: bool,
}

impl RecordingWeb {
    fn new(results: Vec<Value>) -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            results,
            fail: false,
        }
    }

    fn failing() -> Self {
        Self {
            queries: Mutex::new(Vec::new()),
            results: Vec::new(),
            fail: true,
        }
    }

    fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl WebSearchBackend for RecordingWeb {
    async fn run(&self, query: &str) -> anyhow::Result<Vec<Value>> {
        self.queries.lock().unwrap().push(query.to_string());
        if self.fail {
            anyhow::bail!("search backend unavailable");
        }
        Ok(self.results.clone())
    }
}

struct StaticRag(Option<String>);

#[async_trait]
impl RagRetriever for StaticRag {
    async fn retrieve(&self, _text: &str) -> anyhow::Result<Option<String>> {
        Ok(self.0.clone())
    }
}

async fn store_with_question(question: &str) -> (Store, QuestionRecord) {
    // Single connection so the in-memory database is shared
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = Store::new(pool);
    store.migrate().await.unwrap();
    store.create_session("s1").await.unwrap();

    let content = QuestionContent {
        user_question: question.into(),
        ocr_text: None,
    };
    let id = store.add_question("s1", &content).await.unwrap();
    let record = store.get_question(id).await.unwrap().unwrap();
    (store, record)
}

fn sample_results() -> Vec<Value> {
    vec![
        json!({
            "title": "合同违约责任解析 2024年3月1日",
            "content": "违约方应当承担继续履行、采取补救措施或者赔偿损失等责任。",
            "link": "https://example.com/a",
            "media": "法院网",
        }),
        json!({
            "title": "违约金调整规则",
            "content": "约定的违约金过分高于造成的损失的，可以请求适当减少。",
            "link": "https://example.com/b",
            "media": "普法网",
        }),
    ]
}

#[tokio::test]
async fn unrelated_question_never_calls_web_search() {
    let (store, question) = store_with_question("今天天气怎么样").await;
    let web = Arc::new(RecordingWeb::new(sample_results()));
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(StaticExtractor {
            related: false,
            keywords: vec![],
            fail: false,
        }),
        web.clone(),
        Arc::new(StaticRag(None)),
    );

    let outcome = orchestrator.retrieve(&question).await;

    assert!(outcome.web.is_none());
    assert!(web.queries().is_empty());
    let artifacts = store.get_artifacts(question.id).await.unwrap();
    assert!(artifacts.web.is_none());
}

#[tokio::test]
async fn related_question_searches_with_joined_keywords() {
    let (store, question) = store_with_question("合同违约了怎么办").await;
    let web = Arc::new(RecordingWeb::new(sample_results()));
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(StaticExtractor {
            related: true,
            keywords: vec!["合同".into(), "违约".into()],
            fail: false,
        }),
        web.clone(),
        Arc::new(StaticRag(None)),
    );

    let outcome = orchestrator.retrieve(&question).await;

    assert_eq!(web.queries(), vec!["合同 违约"]);

    let items = outcome.web.expect("web results expected");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].source, "法院网");
    assert_eq!(items[0].published_date.as_deref(), Some("2024-03-01"));

    // One normalized web artifact lands in the store
    let artifacts = store.get_artifacts(question.id).await.unwrap();
    let stored: Vec<WebSearchItem> =
        serde_json::from_str(&artifacts.web.expect("web artifact expected")).unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[1].title, "违约金调整规则");
}

#[tokio::test]
async fn extraction_failure_degrades_to_no_web_artifact() {
    let (store, question) = store_with_question("合同违约了怎么办").await;
    let web = Arc::new(RecordingWeb::new(sample_results()));
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(StaticExtractor {
            related: true,
            keywords: vec!["合同".into()],
            fail: true,
        }),
        web.clone(),
        Arc::new(StaticRag(None)),
    );

    let outcome = orchestrator.retrieve(&question).await;

    assert!(outcome.web.is_none());
    assert!(web.queries().is_empty());
    assert!(store.get_artifacts(question.id).await.unwrap().web.is_none());
}

#[tokio::test]
async fn web_failure_degrades_to_no_web_artifact() {
    let (store, question) = store_with_question("合同违约了怎么办").await;
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(StaticExtractor {
            related: true,
            keywords: vec!["合同".into()],
            fail: false,
        }),
        Arc::new(RecordingWeb::failing()),
        Arc::new(StaticRag(None)),
    );

    let outcome = orchestrator.retrieve(&question).await;

    assert!(outcome.web.is_none());
    assert!(store.get_artifacts(question.id).await.unwrap().web.is_none());
}

#[tokio::test]
async fn empty_search_results_leave_no_artifact() {
    let (store, question) = store_with_question("合同违约了怎么办").await;
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(StaticExtractor {
            related: true,
            keywords: vec!["合同".into()],
            fail: false,
        }),
        Arc::new(RecordingWeb::new(vec![])),
        Arc::new(StaticRag(None)),
    );

    let outcome = orchestrator.retrieve(&question).await;

    assert!(outcome.web.is_none());
    assert!(store.get_artifacts(question.id).await.unwrap().web.is_none());
}

#[tokio::test]
async fn rag_result_is_persisted() {
    let (store, question) = store_with_question("合同违约了怎么办").await;
    let orchestrator = RetrievalOrchestrator::new(
        store.clone(),
        Arc::new(StaticExtractor {
            related: false,
            keywords: vec![],
            fail: false,
        }),
        Arc::new(RecordingWeb::new(vec![])),
        Arc::new(StaticRag(Some("《民法典》第五百七十七条……".into()))),
    );

    let outcome = orchestrator.retrieve(&question).await;

    assert_eq!(outcome.rag.as_deref(), Some("《民法典》第五百七十七条……"));
    let artifacts = store.get_artifacts(question.id).await.unwrap();
    assert_eq!(artifacts.rag.as_deref(), Some("《民法典》第五百七十七条……"));
}
