use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,

    // Counters
    pub reports_transition_total: IntCounterVec,
    pub report_validation_issues_total: IntCounterVec,
    pub export_files_total: IntCounterVec,

    // Histograms
    pub http_request_duration_seconds: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let reports_transition_total = IntCounterVec::new(
            Opts::new("reports_transition_total", "Report lifecycle transitions"),
            &["action", "result"], // action: submit|approve|reject, result: ok|blocked|invalid|error
        )?;

        let report_validation_issues_total = IntCounterVec::new(
            Opts::new(
                "report_validation_issues_total",
                "Validation issues found in submitted or previewed reports",
            ),
            &["severity"],
        )?;

        let export_files_total = IntCounterVec::new(
            Opts::new("export_files_total", "Report files exported"),
            &["format"], // csv|json
        )?;

        let http_request_duration_seconds = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request duration seconds"),
            &["path", "method", "status"],
        )?;

        registry.register(Box::new(reports_transition_total.clone()))?;
        registry.register(Box::new(report_validation_issues_total.clone()))?;
        registry.register(Box::new(export_files_total.clone()))?;
        registry.register(Box::new(http_request_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            reports_transition_total,
            report_validation_issues_total,
            export_files_total,
            http_request_duration_seconds,
        })
    }

    pub fn record_transition(&self, action: &str, result: &str) {
        self.reports_transition_total
            .with_label_values(&[action, result])
            .inc();
    }

    pub fn record_validation(&self, report: &crate::domain::validation::ValidationReport) {
        for issue in &report.issues {
            self.report_validation_issues_total
                .with_label_values(&[issue.severity.as_str()])
                .inc();
        }
    }

    pub fn render(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let mf = self.registry.gather();
        let mut buf = Vec::new();
        encoder
            .encode(&mf, &mut buf)
            .map_err(|e| e.to_string())?;
        String::from_utf8(buf).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::validation::ValidationReport;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transition("submit", "ok");

        let mut report = ValidationReport::new();
        report.error("EMPTY_REPORT", "Balance sheet has no accounts", None);
        report.warning("NO_EQUITY_LINES", "No equity", None);
        metrics.record_validation(&report);

        let text = metrics.render().unwrap();
        assert!(text.contains("reports_transition_total{action=\"submit\",result=\"ok\"} 1"));
        assert!(text.contains("report_validation_issues_total{severity=\"error\"} 1"));
    }
}
