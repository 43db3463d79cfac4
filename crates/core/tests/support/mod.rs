#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use coverquote_core::config::AppConfig;
use coverquote_core::domain::insurer::{OutageWindow, PackageType, PaymentPlan};
use coverquote_core::domain::payload::{
    ActivityCodePayload, ApplicationPayload, BusinessPayload, ContactPayload, LocationPayload,
    PolicyPayload, TaxIdType,
};
use coverquote_core::domain::question::CatalogQuestion;
use coverquote_core::ports::{
    AgencyInsurerRecord, AgencyLocationRecord, AgencyLocationStore, ApplicationStore,
    EncryptionService, InsurerRecord, InsurerStore, NewQuote, QuestionCatalog, QuestionQuery,
    QuoteProgress, QuoteStore, RepositoryError, ServiceError, ZipCode, ZipCodeLookup,
};
use coverquote_core::{
    AgencyLocationId, AggregatedStatus, ApplicationState, BindDecision, BindIntegration,
    EngineDeps, InMemoryAuditSink, InsurerId, IntegrationRegistry, NotificationEvent,
    NotificationQueue, PolicyType, QuoteBind, QuoteId, QuoteIntegration, QuoteOutcome,
    QuoteRecord, QuoteRequest,
};
use coverquote_core::ports::IntegrationError;

pub const HOUSE: u64 = 1;
pub const AGENCY: u64 = 12;
pub const GRANITE: u64 = 5;
pub const HARBOR: u64 = 7;
pub const SUMMIT: u64 = 9;

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

pub fn in_days(days: u64) -> NaiveDate {
    today().checked_add_days(Days::new(days)).expect("date in range")
}

#[derive(Default)]
pub struct Zips(HashMap<String, ZipCode>);

impl Zips {
    pub fn standard() -> Self {
        let mut zips = HashMap::new();
        for (zip, city, territory) in [
            ("94103", "San Francisco", "CA"),
            ("59601", "Helena", "MT"),
            ("97201", "Portland", "OR"),
        ] {
            zips.insert(
                zip.to_owned(),
                ZipCode { zip: zip.to_owned(), city: city.to_owned(), territory: territory.to_owned() },
            );
        }
        Self(zips)
    }
}

#[async_trait]
impl ZipCodeLookup for Zips {
    async fn lookup(&self, zip: &str) -> Result<Option<ZipCode>, RepositoryError> {
        Ok(self.0.get(zip).cloned())
    }
}

#[derive(Clone)]
pub struct AgencyFixture {
    pub record: AgencyLocationRecord,
    pub insurers: Vec<AgencyInsurerRecord>,
    pub territories: Vec<String>,
}

pub fn appointment(insurer: u64, types: &[PolicyType]) -> AgencyInsurerRecord {
    AgencyInsurerRecord {
        insurer_id: InsurerId(insurer),
        agency_code: Some(format!("AG-{insurer}")),
        agent_code: Some(format!("AT-{insurer}")),
        bop: types.contains(&PolicyType::Bop),
        gl: types.contains(&PolicyType::Gl),
        wc: types.contains(&PolicyType::Wc),
    }
}

pub fn agency(
    id: u64,
    wholesale: bool,
    territories: &[&str],
    insurers: Vec<AgencyInsurerRecord>,
) -> AgencyFixture {
    AgencyFixture {
        record: AgencyLocationRecord {
            id: AgencyLocationId(id),
            agency_id: id * 100,
            agency_name: format!("Agency {id}"),
            email: format!("desk{id}@agency.example"),
            phone: "3035550199".to_owned(),
            website: None,
            wholesale,
        },
        insurers,
        territories: territories.iter().map(|territory| (*territory).to_owned()).collect(),
    }
}

#[derive(Default)]
pub struct Agencies(HashMap<AgencyLocationId, AgencyFixture>);

impl Agencies {
    pub fn with(mut self, fixture: AgencyFixture) -> Self {
        self.0.insert(fixture.record.id, fixture);
        self
    }
}

#[async_trait]
impl AgencyLocationStore for Agencies {
    async fn load_core(
        &self,
        id: AgencyLocationId,
    ) -> Result<Option<AgencyLocationRecord>, RepositoryError> {
        Ok(self.0.get(&id).map(|fixture| fixture.record.clone()))
    }

    async fn load_insurer_settings(
        &self,
        id: AgencyLocationId,
    ) -> Result<Vec<AgencyInsurerRecord>, RepositoryError> {
        Ok(self.0.get(&id).map(|fixture| fixture.insurers.clone()).unwrap_or_default())
    }

    async fn load_territories(&self, id: AgencyLocationId) -> Result<Vec<String>, RepositoryError> {
        Ok(self.0.get(&id).map(|fixture| fixture.territories.clone()).unwrap_or_default())
    }
}

pub struct Insurers {
    records: HashMap<InsurerId, InsurerRecord>,
    pub outages: HashMap<InsurerId, Vec<OutageWindow>>,
    pub inits: Mutex<Vec<InsurerId>>,
}

impl Insurers {
    pub fn standard() -> Self {
        let mut records = HashMap::new();
        for (id, name, slug) in
            [(GRANITE, "Granite Mutual", "granite"), (HARBOR, "Harbor Casualty", "harbor"), (SUMMIT, "Summit Re", "summit")]
        {
            records.insert(
                InsurerId(id),
                InsurerRecord {
                    id: InsurerId(id),
                    name: name.to_owned(),
                    slug: slug.to_owned(),
                    policy_types: PolicyType::ALL.to_vec(),
                    live_username: Some(format!("{slug}-live")),
                    live_password: Some("live-secret".to_owned()),
                    test_username: Some(format!("{slug}-test")),
                    test_password: Some("test-secret".to_owned()),
                },
            );
        }
        Self { records, outages: HashMap::new(), inits: Mutex::new(Vec::new()) }
    }

    pub fn writing(mut self, insurer: u64, types: &[PolicyType]) -> Self {
        if let Some(record) = self.records.get_mut(&InsurerId(insurer)) {
            record.policy_types = types.to_vec();
        }
        self
    }

    pub fn initialized(&self) -> Vec<InsurerId> {
        let mut ids = self.inits.lock().expect("lock").clone();
        ids.sort();
        ids
    }
}

pub fn annual_plan() -> PaymentPlan {
    PaymentPlan { id: 1.into(), name: "Annual".to_owned(), premium_threshold: Decimal::ZERO }
}

pub fn monthly_plan() -> PaymentPlan {
    PaymentPlan { id: 2.into(), name: "Monthly".to_owned(), premium_threshold: Decimal::new(5_000, 0) }
}

#[async_trait]
impl InsurerStore for Insurers {
    async fn load_insurer(&self, id: InsurerId) -> Result<Option<InsurerRecord>, RepositoryError> {
        self.inits.lock().expect("lock").push(id);
        Ok(self.records.get(&id).cloned())
    }

    async fn load_payment_plans(&self, _id: InsurerId) -> Result<Vec<PaymentPlan>, RepositoryError> {
        Ok(vec![annual_plan(), monthly_plan()])
    }

    async fn load_package_types(&self, _id: InsurerId) -> Result<Vec<PackageType>, RepositoryError> {
        Ok(Vec::new())
    }

    async fn load_outages(&self, id: InsurerId) -> Result<Vec<OutageWindow>, RepositoryError> {
        Ok(self.outages.get(&id).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct Catalog {
    pub questions: Vec<CatalogQuestion>,
    pub queries: Mutex<Vec<QuestionQuery>>,
}

#[async_trait]
impl QuestionCatalog for Catalog {
    async fn get_questions(
        &self,
        query: &QuestionQuery,
    ) -> Result<Vec<CatalogQuestion>, ServiceError> {
        self.queries.lock().expect("lock").push(query.clone());
        Ok(self.questions.clone())
    }
}

pub struct PlainText;

#[async_trait]
impl EncryptionService for PlainText {
    async fn encrypt(&self, plaintext: &str) -> Result<String, ServiceError> {
        Ok(plaintext.to_owned())
    }

    async fn decrypt(&self, ciphertext: &str) -> Result<String, ServiceError> {
        Ok(ciphertext.to_owned())
    }
}

#[derive(Default)]
pub struct Applications {
    pub progress: Mutex<Vec<QuoteProgress>>,
    pub transitions: Mutex<Vec<(ApplicationState, ApplicationState)>>,
}

#[async_trait]
impl ApplicationStore for Applications {
    async fn update_progress(
        &self,
        _id: coverquote_core::ApplicationId,
        progress: QuoteProgress,
    ) -> Result<(), RepositoryError> {
        self.progress.lock().expect("lock").push(progress);
        Ok(())
    }

    async fn transition_state(
        &self,
        _id: coverquote_core::ApplicationId,
        from: ApplicationState,
        to: ApplicationState,
    ) -> Result<bool, RepositoryError> {
        self.transitions.lock().expect("lock").push((from, to));
        Ok(true)
    }
}

#[derive(Default)]
pub struct Quotes {
    pub rows: Mutex<HashMap<QuoteId, QuoteRecord>>,
    pub bind_requested: Mutex<Vec<QuoteId>>,
}

impl Quotes {
    pub fn insert(&self, record: QuoteRecord) {
        self.rows.lock().expect("lock").insert(record.id, record);
    }

    pub fn get(&self, id: QuoteId) -> Option<QuoteRecord> {
        self.rows.lock().expect("lock").get(&id).cloned()
    }
}

#[async_trait]
impl QuoteStore for Quotes {
    async fn record_quote(&self, quote: NewQuote) -> Result<QuoteId, RepositoryError> {
        let mut rows = self.rows.lock().expect("lock");
        let id = QuoteId(rows.len() as u64 + 1);
        rows.insert(
            id,
            QuoteRecord {
                id,
                application_id: quote.application_id,
                agency_location_id: quote.agency_location_id,
                insurer_id: quote.insurer_id,
                policy_type: quote.policy_type,
                amount: quote.amount,
                status: quote.status,
                bound: false,
            },
        );
        Ok(id)
    }

    async fn find_quote(&self, id: QuoteId) -> Result<Option<QuoteRecord>, RepositoryError> {
        Ok(self.get(id))
    }

    async fn mark_bound(&self, id: QuoteId) -> Result<bool, RepositoryError> {
        let mut rows = self.rows.lock().expect("lock");
        match rows.get_mut(&id) {
            Some(row) if !row.bound => {
                row.bound = true;
                row.status = AggregatedStatus::Bound;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_bind_requested(&self, id: QuoteId) -> Result<bool, RepositoryError> {
        self.bind_requested.lock().expect("lock").push(id);
        let mut rows = self.rows.lock().expect("lock");
        match rows.get_mut(&id) {
            Some(row) if !row.bound => {
                row.status = AggregatedStatus::BindRequested;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Quotes a fixed amount, or refers when the amount is zero.
pub struct FixedQuote(pub i64);

#[async_trait]
impl QuoteIntegration for FixedQuote {
    async fn quote(&self, request: QuoteRequest<'_>) -> Result<QuoteOutcome, IntegrationError> {
        let referred = self.0 == 0;
        Ok(QuoteOutcome {
            insurer_id: request.insurer.id,
            insurer_name: request.insurer.name.clone(),
            policy_type: request.policy.policy_type,
            amount: (!referred).then(|| Decimal::new(self.0, 0)),
            status: Some(if referred { AggregatedStatus::Referred } else { AggregatedStatus::Quoted }),
            letter: None,
            quote_id: None,
        })
    }
}

pub struct Failing;

#[async_trait]
impl QuoteIntegration for Failing {
    async fn quote(&self, _request: QuoteRequest<'_>) -> Result<QuoteOutcome, IntegrationError> {
        Err(IntegrationError::Request("carrier timed out".to_owned()))
    }
}

pub struct ScriptedBind {
    pub decision: Result<BindDecision, IntegrationError>,
    pub calls: Mutex<u32>,
}

impl ScriptedBind {
    pub fn new(decision: Result<BindDecision, IntegrationError>) -> Self {
        Self { decision, calls: Mutex::new(0) }
    }
}

#[async_trait]
impl BindIntegration for ScriptedBind {
    async fn bind(&self, _bind: &QuoteBind) -> Result<BindDecision, IntegrationError> {
        *self.calls.lock().expect("lock") += 1;
        self.decision.clone()
    }
}

pub struct Harness {
    pub deps: Arc<EngineDeps>,
    pub insurers: Arc<Insurers>,
    pub catalog: Arc<Catalog>,
    pub applications: Arc<Applications>,
    pub quotes: Arc<Quotes>,
    pub audit: InMemoryAuditSink,
    pub events: mpsc::UnboundedReceiver<NotificationEvent>,
}

impl Harness {
    pub fn drain_events(&mut self) -> Vec<NotificationEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}

pub struct HarnessBuilder {
    pub agencies: Agencies,
    pub insurers: Insurers,
    pub catalog: Catalog,
    pub registry: IntegrationRegistry,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            agencies: Agencies::default()
                .with(agency(
                    HOUSE,
                    false,
                    &["CA", "MT", "OR"],
                    vec![
                        appointment(GRANITE, &PolicyType::ALL),
                        appointment(SUMMIT, &PolicyType::ALL),
                    ],
                ))
                .with(agency(
                    AGENCY,
                    false,
                    &["CA", "MT"],
                    vec![
                        appointment(GRANITE, &[PolicyType::Gl, PolicyType::Wc]),
                        appointment(HARBOR, &[PolicyType::Gl, PolicyType::Wc]),
                    ],
                )),
            insurers: Insurers::standard(),
            catalog: Catalog::default(),
            registry: IntegrationRegistry::new(),
        }
    }

    pub fn agency(mut self, fixture: AgencyFixture) -> Self {
        self.agencies = self.agencies.with(fixture);
        self
    }

    pub fn quote(mut self, slug: &str, policy_type: PolicyType, integration: Arc<dyn QuoteIntegration>) -> Self {
        self.registry.register_quote(slug, policy_type, integration);
        self
    }

    pub fn bind(mut self, slug: &str, policy_type: PolicyType, integration: Arc<dyn BindIntegration>) -> Self {
        self.registry.register_bind(slug, policy_type, integration);
        self
    }

    pub fn build(self) -> Harness {
        let insurers = Arc::new(self.insurers);
        let catalog = Arc::new(self.catalog);
        let applications = Arc::new(Applications::default());
        let quotes = Arc::new(Quotes::default());
        let audit = InMemoryAuditSink::default();
        let (notifications, events) = NotificationQueue::channel();

        let deps = Arc::new(EngineDeps {
            config: AppConfig::default(),
            zips: Arc::new(Zips::standard()),
            agencies: Arc::new(self.agencies),
            insurers: insurers.clone(),
            questions: catalog.clone(),
            encryption: Arc::new(PlainText),
            applications: applications.clone(),
            quotes: quotes.clone(),
            integrations: self.registry,
            notifications,
            audit: Arc::new(audit.clone()),
        });

        Harness { deps, insurers, catalog, applications, quotes, audit, events }
    }
}

pub fn location(zip: &str) -> LocationPayload {
    LocationPayload {
        address: "400 Market St".to_owned(),
        zip: zip.to_owned(),
        full_time_employees: 4,
        part_time_employees: 1,
        activity_codes: vec![ActivityCodePayload { id: 2_281.into(), payroll: Decimal::new(180_000, 0) }],
        ..LocationPayload::default()
    }
}

pub fn gl_policy(insurers: Vec<u64>) -> PolicyPayload {
    PolicyPayload {
        policy_type: PolicyType::Gl,
        effective_date: in_days(10),
        limits: "1000000/2000000/2000000".to_owned(),
        insurers,
        claims: Vec::new(),
        gross_sales: Some(Decimal::new(750_000, 0)),
        coverage_lapse_non_payment: None,
        deductible: Some(500),
        coverage_lapse: None,
    }
}

pub fn wc_policy(insurers: Vec<u64>) -> PolicyPayload {
    PolicyPayload {
        policy_type: PolicyType::Wc,
        effective_date: in_days(10),
        limits: "1000000/1000000/1000000".to_owned(),
        insurers,
        claims: Vec::new(),
        gross_sales: None,
        coverage_lapse_non_payment: None,
        deductible: None,
        coverage_lapse: Some(false),
    }
}

pub fn payload(zip: &str, entity_type: &str, policies: Vec<PolicyPayload>) -> ApplicationPayload {
    ApplicationPayload {
        id: 42,
        test: false,
        agency_location_id: Some(AGENCY),
        business: BusinessPayload {
            name: "Acme Plumbing".to_owned(),
            dba: None,
            entity_type: entity_type.to_owned(),
            tax_id: "12-3456789".to_owned(),
            tax_id_type: TaxIdType::Ein,
            founded: NaiveDate::from_ymd_opt(2012, 3, 1).expect("date"),
            industry_code: 2_281,
            website: None,
            phone: "(415) 555-0100".to_owned(),
            mailing_address: "400 Market St".to_owned(),
            mailing_zip: zip.to_owned(),
            owners: Vec::new(),
            num_owners: None,
            owners_included: true,
            management_structure: None,
            corporation_type: None,
            unincorporated_association: None,
            contacts: vec![ContactPayload {
                first_name: "Dana".to_owned(),
                last_name: "Reyes".to_owned(),
                email: "dana@acme.example".to_owned(),
                phone: "415-555-0100".to_owned(),
                primary: false,
            }],
            locations: vec![location(zip)],
        },
        policies,
        questions: HashMap::new(),
    }
}
