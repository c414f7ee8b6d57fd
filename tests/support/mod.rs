#![allow(dead_code)]

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use sea_orm::ActiveModelTrait;
use serde_json::{Value, json};

use fulfillment::{
    AppState,
    config::{
        AiConfig, CacheConfig, Config, DatabaseConfig, LockModeSetting, PrinterConfig,
        SchedulerConfig, SelectionConfig, ServerConfig,
    },
    error::{AppError, Result},
    infrastructure::{
        cache::Cache,
        db::{
            Database,
            entities::{
                ai_provider::{self, ProviderKind, ProviderMode},
                ai_task,
                coupon::{self, DiscountType},
                franchisee,
                order::{self, OrderStatus},
                order_event,
                order_image::ImageKind,
            },
            repositories::{
                AiProviderRepository, AiTaskRepository, CouponRepository, FranchiseeRepository,
                OrderDraft, OrderRepository, ProviderDraft,
            },
        },
    },
    services::{
        ai_tasks::{
            self,
            provider::{GenerationProvider, PollOutcome, SubmitOutcome},
            registry::ProviderRegistry,
            types::NewTask,
        },
        clock::{Clock, ManualClock},
        events::{self, EventBus},
        orders::{self, PaymentSignal, TransitionRequest, Trigger},
        printer::{
            client::{PrinterClient, VendorResponse},
            settings::PrinterSettings,
        },
        selection::token::SelectionTokenService,
    },
};

pub const INTERNAL_KEY: &str = "test-internal-key";
pub const TOKEN_SECRET: &str = "selection-token-secret-for-tests-0123456789";
pub const CALLBACK_SECRET: &str = "printer-callback-secret";
pub const PROVIDER_NAME: &str = "fake-provider";
pub const PROVIDER_SECRET: &str = "provider-callback-secret";

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
            cors_allowed_origins: vec![],
            max_concurrent_requests: 16,
            internal_api_key: INTERNAL_KEY.into(),
        },
        // One connection: every in-memory SQLite connection is its own database.
        database: DatabaseConfig {
            url: "sqlite::memory:".into(),
            max_connections: 1,
            min_connections: 1,
            connect_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(600),
            lock_mode: LockModeSetting::Auto,
        },
        cache: CacheConfig::default(),
        selection: SelectionConfig::with_secret(TOKEN_SECRET),
        scheduler: SchedulerConfig::default(),
        printer: PrinterConfig::with_callback_secret(CALLBACK_SECRET),
        ai: AiConfig::default(),
    }
}

/// Provider double answering from scripted queues.
///
/// Empty queues fall back to an accepted job and a running poll.
#[derive(Default)]
pub struct FakeProvider {
    submits: Mutex<VecDeque<Result<SubmitOutcome>>>,
    polls: Mutex<VecDeque<Result<PollOutcome>>>,
    pub submit_calls: Mutex<Vec<uuid::Uuid>>,
    pub poll_calls: Mutex<Vec<String>>,
    pub cancel_calls: Mutex<Vec<String>>,
    latency: Mutex<Option<Duration>>,
}

impl FakeProvider {
    /// Holds every submit for `latency` before answering.
    pub fn slow_down(&self, latency: Duration) {
        *self.latency.lock().unwrap() = Some(latency);
    }

    pub fn on_submit(&self, outcome: Result<SubmitOutcome>) {
        self.submits.lock().unwrap().push_back(outcome);
    }

    pub fn on_poll(&self, outcome: Result<PollOutcome>) {
        self.polls.lock().unwrap().push_back(outcome);
    }

    pub fn completes_with(&self, result_url: &str) {
        self.on_submit(Ok(SubmitOutcome::Completed {
            result_url: result_url.into(),
        }));
    }

    pub fn fails_with(&self, message: &str) {
        self.on_submit(Err(AppError::external("fake-provider", message)));
    }

    pub fn submit_count(&self) -> usize {
        self.submit_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationProvider for FakeProvider {
    async fn submit(
        &self,
        _config: &ai_provider::Model,
        task: &ai_task::Model,
    ) -> Result<SubmitOutcome> {
        let count = {
            let mut calls = self.submit_calls.lock().unwrap();
            calls.push(task.id);
            calls.len()
        };

        let latency = *self.latency.lock().unwrap();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Ok(SubmitOutcome::Accepted {
                    job_id: format!("job-{count}"),
                })
            })
    }

    async fn poll(
        &self,
        _config: &ai_provider::Model,
        _task: &ai_task::Model,
        job_id: &str,
    ) -> Result<PollOutcome> {
        self.poll_calls.lock().unwrap().push(job_id.to_string());
        self.polls
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(PollOutcome::Running))
    }

    async fn cancel(
        &self,
        _config: &ai_provider::Model,
        _task: &ai_task::Model,
        job_id: &str,
    ) -> Result<()> {
        self.cancel_calls.lock().unwrap().push(job_id.to_string());
        Ok(())
    }
}

/// Print-house double. Empty queues accept.
#[derive(Default)]
pub struct FakePrinter {
    submits: Mutex<VecDeque<Result<VendorResponse>>>,
    cancels: Mutex<VecDeque<Result<VendorResponse>>>,
    pub submitted: Mutex<Vec<Value>>,
    pub cancelled: Mutex<Vec<Value>>,
}

pub fn vendor(status: u16, body: Value) -> VendorResponse {
    VendorResponse { status, body }
}

pub fn accepted() -> VendorResponse {
    vendor(200, json!({ "success": true, "code": 0 }))
}

pub fn unavailable() -> VendorResponse {
    vendor(503, json!({ "raw": "service unavailable" }))
}

impl FakePrinter {
    pub fn on_submit(&self, response: Result<VendorResponse>) {
        self.submits.lock().unwrap().push_back(response);
    }

    pub fn on_cancel(&self, response: Result<VendorResponse>) {
        self.cancels.lock().unwrap().push_back(response);
    }

    pub fn submit_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancelled.lock().unwrap().len()
    }
}

#[async_trait]
impl PrinterClient for FakePrinter {
    async fn submit_order(
        &self,
        _settings: &PrinterSettings,
        payload: &Value,
    ) -> Result<VendorResponse> {
        self.submitted.lock().unwrap().push(payload.clone());
        self.submits
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(accepted()))
    }

    async fn cancel_order(
        &self,
        _settings: &PrinterSettings,
        payload: &Value,
    ) -> Result<VendorResponse> {
        self.cancelled.lock().unwrap().push(payload.clone());
        self.cancels
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(accepted()))
    }
}

pub struct TestApp {
    pub state: AppState,
    pub clock: Arc<ManualClock>,
    pub printer: Arc<FakePrinter>,
    pub provider: Arc<FakeProvider>,
    pub provider_id: i32,
}

pub fn draft() -> OrderDraft {
    OrderDraft {
        order_number: Some("PET20250101000000AAAA".into()),
        product_category: "portrait".into(),
        customer_name: "Ada".into(),
        customer_phone: "13800000000".into(),
        customer_address: Some(
            json!({ "receiver": "Ada", "phone": "13800000000", "fullAddress": "1 Main St" })
                .to_string(),
        ),
        size: Some("A4".into()),
        price_cents: 19_900,
        ..OrderDraft::default()
    }
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    pub async fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let mut config = test_config();
        adjust(&mut config);

        let db = Database::init_db(&config.database)
            .await
            .expect("open test database");
        db.run_migrations().await.expect("run migrations");

        let cache = Cache::init(&config).await.expect("init cache");
        let clock = Arc::new(ManualClock::new(start_time()));
        let printer = Arc::new(FakePrinter::default());
        let provider = Arc::new(FakeProvider::default());

        let providers = ProviderRegistry::new(&config.ai).expect("provider registry");
        providers.register(PROVIDER_NAME, provider.clone()).await;

        let state = AppState {
            tokens: Arc::new(SelectionTokenService::new(&config.selection)),
            config: Arc::new(config),
            db: Arc::new(db),
            cache: Arc::new(cache),
            clock: clock.clone(),
            events: Arc::new(EventBus::new()),
            providers: Arc::new(providers),
            printer: printer.clone(),
        };

        let provider_row = AiProviderRepository::create(
            state.db.get_connection(),
            ProviderDraft {
                name: PROVIDER_NAME.into(),
                kind: ProviderKind::Direct,
                mode: ProviderMode::Async,
                base_url: "http://127.0.0.1:1".into(),
                submit_path: "/submit".into(),
                poll_path: "/poll".into(),
                cancel_path: None,
                api_key: "provider-key".into(),
                callback_secret: Some(PROVIDER_SECRET.into()),
                model_name: "fake-model".into(),
                max_retries: 2,
                task_timeout_secs: 3_600,
                poll_base_secs: 5,
                poll_cap_secs: 60,
            },
            start_time(),
        )
        .await
        .expect("seed provider");

        Self {
            state,
            clock,
            printer,
            provider,
            provider_id: provider_row.id,
        }
    }

    pub async fn order(&self, order_id: i32) -> order::Model {
        OrderRepository::find_by_id(self.state.db.get_connection(), order_id)
            .await
            .unwrap()
            .expect("order exists")
    }

    pub async fn status(&self, order_id: i32) -> OrderStatus {
        self.order(order_id).await.order_status().unwrap()
    }

    pub async fn events(&self, order_id: i32) -> Vec<order_event::Model> {
        events::events_for_order(&self.state, order_id).await.unwrap()
    }

    /// Overwrites raw columns, bypassing the state machine.
    pub async fn force(&self, order_id: i32, adjust: impl FnOnce(&mut order::ActiveModel)) {
        let mut active: order::ActiveModel = self.order(order_id).await.into();
        adjust(&mut active);
        active.update(self.state.db.get_connection()).await.unwrap();
    }

    pub async fn create_order(&self, draft: OrderDraft) -> order::Model {
        orders::create_order(&self.state, draft).await.unwrap()
    }

    pub async fn pay(&self, order: &order::Model) -> order::Model {
        let paid = orders::payment_paid(
            &self.state,
            PaymentSignal {
                order_number: order.order_number.clone(),
                transaction_id: format!("TX-{}", order.id),
                amount_cents: order.price_cents,
                paid_at: None,
            },
        )
        .await
        .unwrap();

        paid.into_iter().find(|row| row.id == order.id).unwrap()
    }

    /// Paid, shot and retouched; ready to start AI work.
    pub async fn retouched_order(&self, draft: OrderDraft) -> order::Model {
        let order = self.create_order(draft).await;
        self.pay(&order).await;

        orders::record_shooting(
            &self.state,
            order.id,
            Some("uploads/original_1.jpg".into()),
            "studio",
        )
        .await
        .unwrap();
        orders::transition(
            &self.state,
            TransitionRequest::new(order.id, OrderStatus::Retouching, Trigger::Admin, "studio"),
        )
        .await
        .unwrap();

        orders::record_retouch(
            &self.state,
            order.id,
            "uploads/final_1.jpg".into(),
            None,
            "studio",
        )
        .await
        .unwrap()
    }

    pub async fn add_task(&self, order_id: i32) -> ai_task::Model {
        ai_tasks::create_task(
            &self.state,
            NewTask {
                order_id: Some(order_id),
                provider_id: self.provider_id,
                input_image_path: "uploads/final_1.jpg".into(),
                prompt: "oil painting".into(),
                params: None,
                style_category_id: None,
                style_image_id: None,
            },
        )
        .await
        .unwrap()
    }

    /// Walks an order to pending_selection with `renders` synchronous renders.
    pub async fn order_awaiting_selection(&self, draft: OrderDraft, renders: usize) -> order::Model {
        let order = self.retouched_order(draft).await;
        for index in 0..renders {
            self.add_task(order.id).await;
            self.provider
                .completes_with(&format!("https://cdn.test/renders/hd_{}_{index}.png", order.id));
        }

        let order = ai_tasks::start_order(&self.state, order.id, "studio", None)
            .await
            .unwrap();
        assert_eq!(order.order_status().unwrap(), OrderStatus::PendingSelection);
        order
    }

    pub async fn render_ids(&self, order_id: i32) -> Vec<i32> {
        OrderRepository::list_images(self.state.db.get_connection(), order_id)
            .await
            .unwrap()
            .into_iter()
            .filter(|image| image.kind == ImageKind::Render)
            .map(|image| image.id)
            .collect()
    }

    pub async fn task(&self, task_id: uuid::Uuid) -> ai_task::Model {
        AiTaskRepository::find_by_id(self.state.db.get_connection(), task_id)
            .await
            .unwrap()
            .expect("task exists")
    }

    pub async fn franchisee(&self, balance_cents: i64) -> franchisee::Model {
        FranchiseeRepository::create(
            self.state.db.get_connection(),
            "Downtown Pets",
            balance_cents,
            Some("SHOP-DT".into()),
            Some("Downtown Pets".into()),
            self.clock.now(),
        )
        .await
        .unwrap()
    }

    pub async fn franchisee_balance(&self, franchisee_id: i32) -> i64 {
        FranchiseeRepository::find_by_id(self.state.db.get_connection(), franchisee_id)
            .await
            .unwrap()
            .expect("franchisee exists")
            .balance_cents
    }

    pub async fn coupon(
        &self,
        code: &str,
        customer_phone: Option<&str>,
        expires_at: Option<DateTime<Utc>>,
    ) -> coupon::Model {
        CouponRepository::create(
            self.state.db.get_connection(),
            code,
            DiscountType::Fixed,
            2_000,
            "admin",
            customer_phone.map(str::to_string),
            expires_at,
            self.clock.now(),
        )
        .await
        .unwrap()
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.clock.advance(by);
    }
}
