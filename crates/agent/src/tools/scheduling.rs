//! Meeting scheduling: availability lookup and single-use booking links.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdr_assist_core::config::SchedulingSettings;
use sdr_assist_core::domain::scheduling::{
    BookingLink, BookingRequest, Slot, TimeWindow, MAX_OFFERED_SLOTS,
};
use sdr_assist_core::errors::GatewayError;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, info, warn};

use super::{parse_arguments, Tool, ToolArgumentsError};
use crate::assistant::FunctionDeclaration;

pub const OFFER_SLOTS_TOOL: &str = "oferecerHorarios";
pub const BOOK_MEETING_TOOL: &str = "agendarReuniao";

const NOT_CONFIGURED_TEXT: &str = "Erro: O URI do tipo de evento do Calendly não está configurado.";

#[async_trait]
pub trait SchedulingGateway: Send + Sync {
    /// Available start times for the configured event type inside `window`,
    /// in the order the provider returns them.
    async fn available_times(
        &self,
        settings: &SchedulingSettings,
        window: &TimeWindow,
    ) -> Result<Vec<Slot>, GatewayError>;

    /// Creates a link that can be used for exactly one booking. `Ok(None)`
    /// when the provider answered without a booking URL.
    async fn create_single_use_link(
        &self,
        settings: &SchedulingSettings,
    ) -> Result<Option<String>, GatewayError>;
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SchedulingFailure {
    #[error("scheduling credentials or event type are not configured")]
    NotConfigured,
    #[error("scheduling provider unreachable: {0}")]
    Unreachable(GatewayError),
    #[error("scheduling provider did not return a booking url")]
    MissingBookingUrl,
}

pub struct Scheduler {
    gateway: Arc<dyn SchedulingGateway>,
    settings: Option<SchedulingSettings>,
}

impl Scheduler {
    pub fn new(gateway: Arc<dyn SchedulingGateway>, settings: Option<SchedulingSettings>) -> Self {
        Self { gateway, settings }
    }

    pub fn is_configured(&self) -> bool {
        self.settings.is_some()
    }

    pub async fn list_available_slots(&self) -> Result<Vec<Slot>, SchedulingFailure> {
        self.list_available_slots_at(Utc::now()).await
    }

    pub async fn list_available_slots_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Slot>, SchedulingFailure> {
        let settings = self.settings()?;
        let window = TimeWindow::upcoming(now);

        let mut slots = self.gateway.available_times(settings, &window).await.map_err(|source| {
            warn!(
                event_name = "agent.scheduling.availability_unreachable",
                error = %source,
                "could not fetch available times"
            );
            SchedulingFailure::Unreachable(source)
        })?;
        slots.truncate(MAX_OFFERED_SLOTS);

        info!(
            event_name = "agent.scheduling.slots_listed",
            window_start = %window.start_param(),
            slot_count = slots.len(),
            "available slots listed"
        );
        Ok(slots)
    }

    /// The link is generic for the event type. The requested slot is only
    /// logged and the attendee is not used.
    pub async fn generate_booking_link(
        &self,
        request: &BookingRequest,
    ) -> Result<BookingLink, SchedulingFailure> {
        let settings = self.settings()?;
        info!(
            event_name = "agent.scheduling.booking_requested",
            chosen_slot = %request.chosen_slot,
            "generating single-use booking link"
        );

        match self.gateway.create_single_use_link(settings).await {
            Ok(Some(url)) if !url.trim().is_empty() => Ok(BookingLink(url)),
            Ok(_) => {
                warn!(
                    event_name = "agent.scheduling.booking_url_missing",
                    "scheduling link response had no booking_url"
                );
                Err(SchedulingFailure::MissingBookingUrl)
            }
            Err(source) => {
                warn!(
                    event_name = "agent.scheduling.link_unreachable",
                    error = %source,
                    "could not create scheduling link"
                );
                Err(SchedulingFailure::Unreachable(source))
            }
        }
    }

    fn settings(&self) -> Result<&SchedulingSettings, SchedulingFailure> {
        self.settings.as_ref().ok_or_else(|| {
            error!(
                event_name = "agent.scheduling.not_configured",
                "CALENDLY_API_KEY or CALENDLY_EVENT_TYPE_URI is not configured"
            );
            SchedulingFailure::NotConfigured
        })
    }
}

pub fn render_slots(outcome: &Result<Vec<Slot>, SchedulingFailure>) -> String {
    match outcome {
        Ok(slots) if slots.is_empty() => {
            "Não encontrei horários disponíveis nos próximos 7 dias.".to_string()
        }
        Ok(slots) => {
            let listed = slots.iter().map(Slot::display_pt_br).collect::<Vec<_>>().join(", ");
            format!("Claro! Encontrei os seguintes horários disponíveis: {listed}.")
        }
        Err(SchedulingFailure::NotConfigured) => NOT_CONFIGURED_TEXT.to_string(),
        Err(_) => "Desculpe, não consegui verificar os horários disponíveis no momento.".to_string(),
    }
}

pub fn render_booking_link(outcome: &Result<BookingLink, SchedulingFailure>) -> String {
    match outcome {
        Ok(link) => format!(
            "Perfeito! Aqui está o seu link exclusivo para confirmar a reunião: {}. Basta clicar para finalizar o agendamento.",
            link.0
        ),
        Err(SchedulingFailure::NotConfigured) => NOT_CONFIGURED_TEXT.to_string(),
        Err(SchedulingFailure::MissingBookingUrl) => {
            "Não consegui gerar o link de agendamento, por favor, tente novamente.".to_string()
        }
        Err(SchedulingFailure::Unreachable(_)) => {
            "Desculpe, não consegui gerar o link de agendamento no momento.".to_string()
        }
    }
}

pub fn offer_slots_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: OFFER_SLOTS_TOOL.to_string(),
        description: "Busca e retorna os próximos horários disponíveis para uma reunião."
            .to_string(),
        parameters: json!({ "type": "object", "properties": {} }),
    }
}

pub fn book_meeting_declaration() -> FunctionDeclaration {
    FunctionDeclaration {
        name: BOOK_MEETING_TOOL.to_string(),
        description: "Agenda a reunião no horário escolhido pelo cliente.".to_string(),
        parameters: json!({
            "type": "object",
            "properties": {
                "horario_escolhido": {
                    "type": "string",
                    "description": "O slot de data e hora que o cliente confirmou. Ex: '2025-10-30T14:00:00'"
                },
                "nome": { "type": "string", "description": "Nome do cliente para o convite." },
                "email": { "type": "string", "description": "E-mail do cliente para o convite." }
            },
            "required": ["horario_escolhido", "nome", "email"]
        }),
    }
}

pub struct OfferSlotsTool {
    scheduler: Arc<Scheduler>,
}

impl OfferSlotsTool {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for OfferSlotsTool {
    fn name(&self) -> &'static str {
        OFFER_SLOTS_TOOL
    }

    fn declaration(&self) -> FunctionDeclaration {
        offer_slots_declaration()
    }

    async fn invoke(&self, _arguments: Value) -> Result<String, ToolArgumentsError> {
        Ok(render_slots(&self.scheduler.list_available_slots().await))
    }
}

pub struct BookMeetingTool {
    scheduler: Arc<Scheduler>,
}

impl BookMeetingTool {
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }
}

#[async_trait]
impl Tool for BookMeetingTool {
    fn name(&self) -> &'static str {
        BOOK_MEETING_TOOL
    }

    fn declaration(&self) -> FunctionDeclaration {
        book_meeting_declaration()
    }

    async fn invoke(&self, arguments: Value) -> Result<String, ToolArgumentsError> {
        let request: BookingRequest = parse_arguments(arguments)?;
        Ok(render_booking_link(&self.scheduler.generate_booking_link(&request).await))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use sdr_assist_core::config::SchedulingSettings;
    use sdr_assist_core::domain::scheduling::{BookingRequest, Slot, TimeWindow};
    use sdr_assist_core::errors::GatewayError;
    use serde_json::json;

    use super::{
        render_booking_link, render_slots, BookMeetingTool, Scheduler, SchedulingFailure,
        SchedulingGateway,
    };
    use crate::tools::testing::CapturedLogs;
    use crate::tools::Tool;

    struct FakeCalendar {
        slots: Result<Vec<Slot>, GatewayError>,
        link: Result<Option<String>, GatewayError>,
        windows: Mutex<Vec<TimeWindow>>,
        calls: Mutex<usize>,
    }

    impl FakeCalendar {
        fn new(slots: Result<Vec<Slot>, GatewayError>) -> Self {
            Self {
                slots,
                link: Ok(Some("https://calendly.com/d/abc-123".to_string())),
                windows: Mutex::default(),
                calls: Mutex::new(0),
            }
        }

        fn with_link(mut self, link: Result<Option<String>, GatewayError>) -> Self {
            self.link = link;
            self
        }

        fn calls(&self) -> usize {
            *self.calls.lock().expect("calls lock")
        }
    }

    #[async_trait]
    impl SchedulingGateway for FakeCalendar {
        async fn available_times(
            &self,
            _settings: &SchedulingSettings,
            window: &TimeWindow,
        ) -> Result<Vec<Slot>, GatewayError> {
            *self.calls.lock().expect("calls lock") += 1;
            self.windows.lock().expect("windows lock").push(*window);
            self.slots.clone()
        }

        async fn create_single_use_link(
            &self,
            _settings: &SchedulingSettings,
        ) -> Result<Option<String>, GatewayError> {
            *self.calls.lock().expect("calls lock") += 1;
            self.link.clone()
        }
    }

    fn settings() -> Option<SchedulingSettings> {
        Some(SchedulingSettings {
            api_key: "calendly-token".to_string().into(),
            event_type_uri: "https://api.calendly.com/event_types/ABC".to_string(),
        })
    }

    fn slots_from(first_hour: u32, count: usize) -> Vec<Slot> {
        let base = Utc.with_ymd_and_hms(2025, 10, 30, first_hour, 0, 0).single().expect("valid");
        (0..count).map(|offset| Slot::new(base + Duration::hours(offset as i64))).collect()
    }

    fn request() -> BookingRequest {
        BookingRequest {
            chosen_slot: "2025-10-30T14:00:00".to_string(),
            name: "Ana".to_string(),
            email: "ana@acme.com".to_string(),
        }
    }

    #[tokio::test]
    async fn empty_availability_renders_no_slots_sentence() {
        let scheduler = Scheduler::new(Arc::new(FakeCalendar::new(Ok(vec![]))), settings());
        let outcome = scheduler.list_available_slots().await;

        assert_eq!(outcome, Ok(vec![]));
        assert_eq!(render_slots(&outcome), "Não encontrei horários disponíveis nos próximos 7 dias.");
    }

    #[tokio::test]
    async fn offers_only_the_first_three_slots_in_order() {
        let calendar = Arc::new(FakeCalendar::new(Ok(slots_from(13, 5))));
        let scheduler = Scheduler::new(calendar.clone(), settings());
        let now = Utc.with_ymd_and_hms(2025, 10, 28, 12, 0, 0).single().expect("valid");

        let outcome = scheduler.list_available_slots_at(now).await;

        assert_eq!(outcome.as_ref().map(Vec::len), Ok(3));
        assert_eq!(
            render_slots(&outcome),
            "Claro! Encontrei os seguintes horários disponíveis: 30 de outubro às 10:00, 30 de outubro às 11:00, 30 de outubro às 12:00."
        );
        let windows = calendar.windows.lock().expect("windows lock").clone();
        assert_eq!(windows, vec![TimeWindow::upcoming(now)]);
    }

    #[tokio::test]
    async fn unreachable_provider_renders_apology() {
        let calendar = FakeCalendar::new(Err(GatewayError::Transport("timeout".to_string())));
        let outcome = Scheduler::new(Arc::new(calendar), settings()).list_available_slots().await;

        assert!(matches!(outcome, Err(SchedulingFailure::Unreachable(_))));
        assert_eq!(
            render_slots(&outcome),
            "Desculpe, não consegui verificar os horários disponíveis no momento."
        );
    }

    #[tokio::test]
    async fn missing_settings_short_circuit_both_operations() {
        let calendar = Arc::new(FakeCalendar::new(Ok(slots_from(13, 1))));
        let scheduler = Scheduler::new(calendar.clone(), None);

        let slots = scheduler.list_available_slots().await;
        let link = scheduler.generate_booking_link(&request()).await;

        let expected = "Erro: O URI do tipo de evento do Calendly não está configurado.";
        assert_eq!(render_slots(&slots), expected);
        assert_eq!(render_booking_link(&link), expected);
        assert_eq!(calendar.calls(), 0);
    }

    #[tokio::test]
    async fn booking_link_is_wrapped_in_confirmation_sentence() {
        let scheduler = Arc::new(Scheduler::new(Arc::new(FakeCalendar::new(Ok(vec![]))), settings()));
        let tool = BookMeetingTool::new(scheduler);

        let output = tool
            .invoke(json!({
                "horario_escolhido": "2025-10-30T14:00:00",
                "nome": "Ana",
                "email": "ana@acme.com"
            }))
            .await
            .expect("valid arguments");

        assert_eq!(
            output,
            "Perfeito! Aqui está o seu link exclusivo para confirmar a reunião: https://calendly.com/d/abc-123. Basta clicar para finalizar o agendamento."
        );
    }

    #[tokio::test]
    async fn link_failures_map_to_distinct_sentences() {
        let missing = FakeCalendar::new(Ok(vec![])).with_link(Ok(None));
        let outcome = Scheduler::new(Arc::new(missing), settings()).generate_booking_link(&request()).await;
        assert_eq!(outcome, Err(SchedulingFailure::MissingBookingUrl));
        assert_eq!(
            render_booking_link(&outcome),
            "Não consegui gerar o link de agendamento, por favor, tente novamente."
        );

        let down = FakeCalendar::new(Ok(vec![]))
            .with_link(Err(GatewayError::Status { status: 502, body: String::new() }));
        let outcome = Scheduler::new(Arc::new(down), settings()).generate_booking_link(&request()).await;
        assert_eq!(
            render_booking_link(&outcome),
            "Desculpe, não consegui gerar o link de agendamento no momento."
        );
    }

    #[tokio::test]
    async fn booking_logs_keep_the_slot_but_not_the_attendee() {
        let logs = CapturedLogs::default();
        let _guard = logs.install();
        let scheduler = Scheduler::new(Arc::new(FakeCalendar::new(Ok(vec![]))), settings());

        scheduler.generate_booking_link(&request()).await.expect("link");

        let text = logs.text();
        assert!(text.contains("agent.scheduling.booking_requested"));
        assert!(text.contains("2025-10-30T14:00:00"));
        assert!(!text.contains("ana@acme.com"));
        assert!(!text.contains("Ana"));
    }
}
