mod common;

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use common::{context, descriptor, ScriptedSource};
use executor::{ReportError, ReportRunner};
use pipeline::{
    ActionContext, ActionError, ActionEvent, ActionPlugin, ActionType, DataResult, EnhanceError,
    EnhancePlugin, Plugin, PluginDescriptor, PluginName, PluginPhase, Registries, RenderError,
    RenderMode, RenderPlugin, RenderResult, ReportConfig, RuntimeContext, SourceKind,
    CONTRACTS_VERSION,
};
use serde_json::{json, Map, Value};

struct UpperRender(PluginDescriptor, &'static str);

impl Plugin for UpperRender {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.0
    }
}

#[async_trait]
impl RenderPlugin for UpperRender {
    fn mode(&self) -> RenderMode {
        RenderMode::new(self.1).unwrap()
    }

    async fn render(
        &self,
        data: &[DataResult],
        report: &ReportConfig,
        _ctx: &RuntimeContext,
    ) -> Result<RenderResult, RenderError> {
        Ok(RenderResult {
            mode: self.mode(),
            content: format!("{}:{}:{}", self.1, report.title.to_uppercase(), data.len()),
            meta: Map::new(),
        })
    }
}

/// Records every invocation; fails when its action payload has `fail`.
struct Recorder {
    descriptor: PluginDescriptor,
    log: Arc<Mutex<Vec<String>>>,
}

impl Plugin for Recorder {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.descriptor
    }
}

#[async_trait]
impl ActionPlugin for Recorder {
    fn action_type(&self) -> ActionType {
        ActionType::new("record").unwrap()
    }

    async fn execute(
        &self,
        spec: &Map<String, Value>,
        ctx: &ActionContext<'_>,
    ) -> Result<(), ActionError> {
        let label = spec.get("label").and_then(Value::as_str).unwrap_or("?");
        let render = ctx.render.map(|r| r.content.clone()).unwrap_or_default();
        self.log
            .lock()
            .unwrap()
            .push(format!("{label}|{:?}|{}|{render}", ctx.event, ctx.data.len()));
        if spec.get("fail").is_some() {
            return Err(ActionError::Io {
                action: "record".into(),
                message: "disk full".into(),
            });
        }
        Ok(())
    }
}

struct Retitle(PluginDescriptor);

impl Plugin for Retitle {
    fn descriptor(&self) -> &PluginDescriptor {
        &self.0
    }
}

impl EnhancePlugin for Retitle {
    fn apply(&self, mut config: Value, _ctx: &RuntimeContext) -> Result<Value, EnhanceError> {
        if let Some(fields) = config.as_object_mut() {
            let title = fields.get("title").and_then(Value::as_str).unwrap_or_default();
            let title = format!("{title} (enhanced)");
            fields.insert("title".into(), json!(title));
        }
        Ok(config)
    }
}

fn runner(log: &Arc<Mutex<Vec<String>>>) -> ReportRunner {
    let mut registries = Registries::new(CONTRACTS_VERSION);
    registries
        .data
        .register(SourceKind::Inline, ScriptedSource::new())
        .unwrap();
    for mode in ["json", "text"] {
        registries
            .render
            .register(
                RenderMode::new(mode).unwrap(),
                Arc::new(UpperRender(descriptor(mode, PluginPhase::Render), mode)),
            )
            .unwrap();
    }
    registries
        .action
        .register(
            ActionType::new("record").unwrap(),
            Arc::new(Recorder {
                descriptor: descriptor("record", PluginPhase::Action),
                log: Arc::clone(log),
            }),
        )
        .unwrap();
    registries
        .enhance
        .register(
            PluginName::new("retitle").unwrap(),
            Arc::new(Retitle(descriptor("retitle", PluginPhase::Enhance))),
        )
        .unwrap();
    registries.lock_all();
    ReportRunner::new(Arc::new(registries))
}

fn raw_report() -> Value {
    json!({
        "title": "daily",
        "fetchers": [
            { "id": "users", "source": { "type": "string", "data": { "value": [{ "n": 1 }] } } },
            { "id": "down", "source": { "type": "string", "data": { "fail": "x" } },
              "process": { "error": { "strategy": "skip" } } }
        ],
        "data": [
            { "title": "Users", "tag": "users",
              "aggregate": { "fetchers": ["users", "down"], "strategy": "concat" } }
        ],
        "actions": [
            { "type": "record", "on": "report_ready", "spec": { "label": "late" } },
            { "type": "record", "on": "data_ready", "spec": { "label": "early", "fail": true } },
            { "type": "record", "on": "report_ready", "renderMode": "text", "spec": { "label": "text" } }
        ]
    })
}

#[tokio::test]
async fn lifecycle_runs_phases_in_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = runner(&log);
    let ctx = context();

    let report = runner.prepare(raw_report(), &ctx).unwrap();
    assert_eq!(report.title, "daily (enhanced)");

    let outcome = runner.run(&report, &ctx).await.unwrap();

    assert_eq!(outcome.data.len(), 1);
    assert_eq!(outcome.data[0].data, json!([{ "n": 1 }]));
    assert!(outcome.data[0].meta.success);
    assert_eq!(outcome.data[0].meta.fetcher_count, 2);

    let modes: Vec<&str> = outcome.renders.iter().map(|r| r.mode.as_str()).collect();
    assert_eq!(modes, vec!["json", "text"]);

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            "early|DataReady|1|".to_string(),
            "late|ReportReady|1|json:DAILY (ENHANCED):1".to_string(),
            "text|ReportReady|1|text:DAILY (ENHANCED):1".to_string(),
        ]
    );

    let events: Vec<ActionEvent> = outcome.actions.iter().map(|a| a.event).collect();
    assert_eq!(
        events,
        vec![ActionEvent::DataReady, ActionEvent::ReportReady, ActionEvent::ReportReady]
    );
    assert!(!outcome.actions[0].succeeded());
    assert!(outcome.actions[1].succeeded());
    assert!(!outcome.succeeded());
}

#[tokio::test]
async fn rendering_is_skipped_without_report_ready_actions() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = runner(&log);
    let ctx = context();
    let mut raw = raw_report();
    raw["actions"] = json!([{ "type": "record", "on": "data_ready", "spec": { "label": "only" } }]);

    let report = runner.prepare(raw, &ctx).unwrap();
    let outcome = runner.run(&report, &ctx).await.unwrap();

    assert!(outcome.renders.is_empty());
    assert!(outcome.succeeded());
}

#[tokio::test]
async fn escalated_aggregate_error_aborts_the_run() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = runner(&log);
    let ctx = context();
    let mut raw = raw_report();
    raw["data"][0]["aggregate"]["fetchers"] = json!(["broken"]);
    raw["fetchers"]
        .as_array_mut()
        .unwrap()
        .push(json!({ "id": "broken", "source": { "type": "string", "data": { "fail": "gone" } } }));

    let report = runner.prepare(raw, &ctx).unwrap();
    let err = runner.run(&report, &ctx).await.unwrap_err();

    assert!(matches!(err, ReportError::Data { ref title, .. } if title == "Users"));
    assert!(log.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unregistered_plugins_are_rejected_before_fetching() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = runner(&log);
    let ctx = context();
    let mut raw = raw_report();
    raw["actions"] = json!([{ "type": "record", "on": "report_ready", "renderMode": "pdf", "spec": {} }]);

    let report = runner.prepare(raw, &ctx).unwrap();
    let err = runner.run(&report, &ctx).await.unwrap_err();

    assert!(matches!(err, ReportError::Registry(_)));
}

#[test]
fn prepare_rejects_malformed_and_inconsistent_configs() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let runner = runner(&log);
    let ctx = context();

    let err = runner.prepare(json!({ "title": "t", "fetchers": "none" }), &ctx).unwrap_err();
    assert!(matches!(err, ReportError::InvalidConfig { .. }));

    let mut raw = raw_report();
    raw["data"][0]["aggregate"]["fetchers"] = json!(["nobody"]);
    let err = runner.prepare(raw, &ctx).unwrap_err();
    assert!(matches!(err, ReportError::Pipeline(_)));
}
