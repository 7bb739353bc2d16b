use prometheus::{CounterVec, Encoder, Opts, Registry, TextEncoder};

/// サービスのメトリクスを保持する
pub struct Metrics {
    registry: Registry,
    usage_checks_total: CounterVec,
    admin_token_verifications_total: CounterVec,
    http_requests_total: CounterVec,
}

impl Metrics {
    /// メトリクスレジストリを作成し、コレクターを登録する
    pub fn new(service_name: &str) -> Self {
        let registry = Registry::new();

        let usage_checks_total = CounterVec::new(
            Opts::new(
                "planforge_usage_checks_total",
                "Total number of quota check-and-consume decisions",
            )
            .const_label("service", service_name),
            &["class", "outcome"],
        )
        .expect("metric can be created");
        registry
            .register(Box::new(usage_checks_total.clone()))
            .expect("collector can be registered");

        let admin_token_verifications_total = CounterVec::new(
            Opts::new(
                "planforge_admin_token_verifications_total",
                "Total number of admin bearer token verifications",
            )
            .const_label("service", service_name),
            &["outcome"],
        )
        .expect("metric can be created");
        registry
            .register(Box::new(admin_token_verifications_total.clone()))
            .expect("collector can be registered");

        let http_requests_total = CounterVec::new(
            Opts::new(
                "planforge_http_requests_total",
                "Total number of HTTP requests",
            )
            .const_label("service", service_name),
            &["method", "path", "status"],
        )
        .expect("metric can be created");
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("collector can be registered");

        Self {
            registry,
            usage_checks_total,
            admin_token_verifications_total,
            http_requests_total,
        }
    }

    pub fn record_usage_check(&self, class: &str, outcome: &str) {
        self.usage_checks_total
            .with_label_values(&[class, outcome])
            .inc();
    }

    pub fn record_admin_verification(&self, outcome: &str) {
        self.admin_token_verifications_total
            .with_label_values(&[outcome])
            .inc();
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: &str) {
        self.http_requests_total
            .with_label_values(&[method, path, status])
            .inc();
    }

    /// Prometheus テキスト形式でエクスポートする
    pub fn gather(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if encoder.encode(&metric_families, &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}
