use crate::domain::debt::{Debt, DebtChanges, DebtId, DebtState, NewDebt};
use crate::domain::income::{Income, NewIncome};
use crate::domain::money::Currency;
use crate::domain::payment::{
    DebtPayments, NewPayment, Payment, PaymentChanges, PaymentFilter, PaymentId, PaymentReceipt,
};
use crate::domain::ports::{DebtStore, IncomeStore, PaymentStore, Repository};
use crate::domain::summary::DashboardSummary;
use crate::domain::user::{Credentials, Session, User, UserId};
use crate::error::{Result, ZenithError};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, RequestBuilder, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_API_URL: &str = "http://localhost:3000";

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[derive(Deserialize)]
struct LoginResponse {
    user: User,
    token: String,
}

#[derive(Deserialize)]
struct DebtsResponse {
    deudas: Vec<Debt>,
}

#[derive(Deserialize)]
struct DebtResponse {
    deuda: Debt,
}

#[derive(Deserialize)]
struct PaymentsResponse {
    abonos: Vec<Payment>,
}

#[derive(Deserialize)]
struct DebtPaymentsResponse {
    abonos: Vec<Payment>,
    total_abonado: Decimal,
}

#[derive(Deserialize)]
struct ReceiptResponse {
    abono: Payment,
    nuevo_saldo: Decimal,
    estado_deuda: DebtState,
}

impl From<ReceiptResponse> for PaymentReceipt {
    fn from(response: ReceiptResponse) -> Self {
        Self {
            payment: response.abono,
            new_balance: response.nuevo_saldo,
            debt_state: response.estado_deuda,
        }
    }
}

#[derive(Deserialize)]
struct DashboardResponse {
    data: DashboardSummary,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    nombre: &'a str,
    email: &'a str,
    password: &'a str,
}

/// Body of `POST /deudas` and `PUT /deudas/:id`; absent fields are left out.
#[derive(Serialize, Default)]
struct DebtBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id_usuario: Option<UserId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    descripcion: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    acreedor: Option<&'a str>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    monto_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moneda: Option<&'a Currency>,
    #[serde(skip_serializing_if = "Option::is_none")]
    fecha_pago_objetivo: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    recordatorio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    interes_aplicado: Option<bool>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    tasa_interes: Option<Decimal>,
}

impl<'a> From<&'a NewDebt> for DebtBody<'a> {
    fn from(debt: &'a NewDebt) -> Self {
        Self {
            id_usuario: Some(debt.user_id),
            descripcion: Some(&debt.description),
            acreedor: Some(&debt.creditor),
            monto_total: Some(debt.principal),
            moneda: Some(&debt.currency),
            fecha_pago_objetivo: Some(debt.due_on),
            recordatorio: Some(debt.reminder),
            interes_aplicado: Some(debt.interest_rate.is_some()),
            tasa_interes: Some(debt.interest_rate.unwrap_or_default()),
        }
    }
}

impl<'a> From<&'a DebtChanges> for DebtBody<'a> {
    fn from(changes: &'a DebtChanges) -> Self {
        Self {
            descripcion: changes.description.as_deref(),
            acreedor: changes.creditor.as_deref(),
            monto_total: changes.principal,
            moneda: changes.currency.as_ref(),
            fecha_pago_objetivo: changes.due_on,
            recordatorio: changes.reminder,
            interes_aplicado: changes.interest_rate.map(|rate| rate.is_some()),
            tasa_interes: changes.interest_rate.map(|rate| rate.unwrap_or_default()),
            ..Self::default()
        }
    }
}

/// Body of `POST /abonos` and `PUT /abonos/:id`. The backend stamps the date.
#[derive(Serialize, Default)]
struct PaymentBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    id_deuda: Option<DebtId>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    monto_abonado: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    moneda: Option<&'a Currency>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        with = "rust_decimal::serde::float_option"
    )]
    tipo_cambio: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    nota: Option<&'a str>,
}

impl<'a> From<&'a NewPayment> for PaymentBody<'a> {
    fn from(payment: &'a NewPayment) -> Self {
        Self {
            id_deuda: Some(payment.debt_id),
            monto_abonado: Some(payment.amount.value()),
            moneda: Some(&payment.currency),
            tipo_cambio: payment.exchange_rate,
            nota: payment.note.as_deref(),
        }
    }
}

impl<'a> From<&'a PaymentChanges> for PaymentBody<'a> {
    fn from(changes: &'a PaymentChanges) -> Self {
        Self {
            monto_abonado: changes.amount.map(|a| a.value()),
            moneda: changes.currency.as_ref(),
            tipo_cambio: changes.exchange_rate,
            nota: changes.note.as_deref(),
            ..Self::default()
        }
    }
}

/// Thin client over the REST backend.
///
/// Holds no credentials of its own: authenticated calls go through an
/// [`HttpRepository`], which pairs the client with a [`Session`].
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, request: RequestBuilder, fallback: &str) -> Result<Vec<u8>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "api response");

        if status.is_success() {
            return Ok(body.to_vec());
        }
        if status == StatusCode::UNAUTHORIZED {
            return Err(ZenithError::Unauthenticated);
        }
        let message = serde_json::from_slice::<ErrorBody>(&body)
            .ok()
            .and_then(|e| e.message)
            .unwrap_or_else(|| fallback.to_string());
        Err(ZenithError::ApiError {
            status: status.as_u16(),
            message,
        })
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder, fallback: &str) -> Result<T> {
        let body = self.execute(request, fallback).await?;
        Ok(serde_json::from_slice(&body)?)
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<Session> {
        let request = self.http.post(self.url("/login")).json(credentials);
        let response: LoginResponse = self.send(request, "Error al iniciar sesión").await?;
        info!(user = response.user.id, "logged in");
        Ok(Session {
            token: response.token,
            user: response.user,
        })
    }

    /// Registers a new account and logs straight into it.
    pub async fn register(&self, name: &str, credentials: &Credentials) -> Result<Session> {
        let body = RegisterBody {
            nombre: name,
            email: &credentials.email,
            password: &credentials.password,
        };
        let request = self.http.post(self.url("/register")).json(&body);
        self.execute(request, "Error al registrar usuario").await?;
        self.login(credentials).await
    }
}

/// Repository backed by the remote REST API, acting for one session.
#[derive(Clone)]
pub struct HttpRepository {
    client: ApiClient,
    session: Session,
}

impl HttpRepository {
    pub fn new(client: ApiClient, session: Session) -> Self {
        Self { client, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn get(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.http.get(self.client.url(path)))
    }

    fn post(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.http.post(self.client.url(path)))
    }

    fn put(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.http.put(self.client.url(path)))
    }

    fn delete(&self, path: &str) -> RequestBuilder {
        self.authed(self.client.http.delete(self.client.url(path)))
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.header(AUTHORIZATION, self.session.bearer())
    }
}

#[async_trait]
impl DebtStore for HttpRepository {
    async fn list_debts(&self, user_id: UserId) -> Result<Vec<Debt>> {
        let path = format!("/deudas/usuario/{}", user_id);
        let response: DebtsResponse = self
            .client
            .send(self.get(&path), "Error al obtener deudas")
            .await?;
        Ok(response.deudas)
    }

    async fn get_debt(&self, id: DebtId) -> Result<Option<Debt>> {
        let path = format!("/deudas/{}", id);
        match self
            .client
            .send::<DebtResponse>(self.get(&path), "Error al obtener la deuda")
            .await
        {
            Ok(response) => Ok(Some(response.deuda)),
            Err(ZenithError::ApiError { status: 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create_debt(&self, debt: NewDebt) -> Result<Debt> {
        debt.validate()?;
        let request = self.post("/deudas").json(&DebtBody::from(&debt));
        let response: DebtResponse = self.client.send(request, "Error al crear la deuda").await?;
        Ok(response.deuda)
    }

    async fn update_debt(&self, id: DebtId, changes: DebtChanges) -> Result<Debt> {
        changes.validate()?;
        let request = self
            .put(&format!("/deudas/{}", id))
            .json(&DebtBody::from(&changes));
        let response: DebtResponse = self
            .client
            .send(request, "Error al actualizar la deuda")
            .await?;
        Ok(response.deuda)
    }

    async fn delete_debt(&self, id: DebtId) -> Result<()> {
        let request = self.delete(&format!("/deudas/{}", id));
        self.client
            .execute(request, "Error al eliminar la deuda")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl PaymentStore for HttpRepository {
    async fn list_payments(&self, filter: PaymentFilter) -> Result<Vec<Payment>> {
        let mut query: Vec<(&str, u32)> = Vec::new();
        if let Some(debt_id) = filter.debt_id {
            query.push(("id_deuda", debt_id));
        }
        if let Some(user_id) = filter.user_id {
            query.push(("id_usuario", user_id));
        }
        let request = self.get("/abonos").query(&query);
        let response: PaymentsResponse = self.client.send(request, "Error al obtener abonos").await?;
        Ok(response.abonos)
    }

    async fn payments_for_debt(&self, debt_id: DebtId) -> Result<DebtPayments> {
        let path = format!("/abonos/deuda/{}", debt_id);
        let response: DebtPaymentsResponse = self
            .client
            .send(self.get(&path), "Error al obtener abonos")
            .await?;
        Ok(DebtPayments {
            payments: response.abonos,
            total_paid: response.total_abonado,
        })
    }

    async fn create_payment(&self, payment: NewPayment) -> Result<PaymentReceipt> {
        let request = self.post("/abonos").json(&PaymentBody::from(&payment));
        let response: ReceiptResponse = self
            .client
            .send(request, "Error al registrar el abono")
            .await?;
        Ok(response.into())
    }

    async fn update_payment(&self, id: PaymentId, changes: PaymentChanges) -> Result<PaymentReceipt> {
        let request = self
            .put(&format!("/abonos/{}", id))
            .json(&PaymentBody::from(&changes));
        let response: ReceiptResponse = self
            .client
            .send(request, "Error al actualizar el abono")
            .await?;
        Ok(response.into())
    }

    async fn delete_payment(&self, id: PaymentId) -> Result<()> {
        let request = self.delete(&format!("/abonos/{}", id));
        self.client
            .execute(request, "Error al eliminar el abono")
            .await?;
        Ok(())
    }
}

#[async_trait]
impl IncomeStore for HttpRepository {
    async fn list_incomes(&self, _user_id: UserId) -> Result<Vec<Income>> {
        Err(ZenithError::Unsupported(
            "incomes are only kept in local storage".to_string(),
        ))
    }

    async fn create_income(&self, _income: NewIncome) -> Result<Income> {
        Err(ZenithError::Unsupported(
            "incomes are only kept in local storage".to_string(),
        ))
    }
}

#[async_trait]
impl Repository for HttpRepository {
    async fn dashboard(&self, user_id: UserId) -> Result<DashboardSummary> {
        let path = format!("/dashboard/{}", user_id);
        let response: DashboardResponse = self
            .client
            .send(self.get(&path), "Error al obtener dashboard")
            .await?;
        Ok(response.data)
    }
}
