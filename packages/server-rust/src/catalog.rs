//! The commerce services exposed through the gateway.

use std::sync::Arc;

use mint_core::error::EndpointError;
use mint_core::{Fault, FaultKind, Param, ServiceEndpointConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::channel::Channel;
use crate::contract::{ContractRegistry, ServiceContract};

/// One remote service: where it lives and what it can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogEntry {
    /// Short name used in gateway routes.
    pub key: &'static str,
    /// Path below the configured host.
    pub service_path: &'static str,
    pub contract_name: &'static str,
    pub client_type: &'static str,
    /// Operations forwarded unchanged.
    pub operations: &'static [&'static str],
    /// Whether calls are retried on an unsuccessful acknowledgement.
    pub retry_on_ack: bool,
}

pub const ACCOUNT: CatalogEntry = CatalogEntry {
    key: "account",
    service_path: "Commerce/Account/AccountWebService.svc",
    contract_name: "Microsoft.CommerceAccount.Interfaces.IAccountService",
    client_type: "AccountServiceClient",
    operations: &["GetAccount", "CreateAccount"],
    retry_on_ack: true,
};

pub const PAYMENT_INSTRUMENT: CatalogEntry = CatalogEntry {
    key: "payment-instrument",
    service_path: "Commerce/PaymentInstrument/PaymentInstrumentWebService.svc",
    contract_name: "Microsoft.CommerceAccount.Interfaces.IPaymentInstrumentService",
    client_type: "PaymentInstrumentServiceClient",
    operations: &["GetPaymentInstruments"],
    retry_on_ack: true,
};

pub const TRANSACTION: CatalogEntry = CatalogEntry {
    key: "transaction",
    service_path: "CommerceTransaction/v1/TransactionWebService.svc",
    contract_name: "Microsoft.Transaction.Interfaces.V201001.ITransactionService",
    client_type: "TransactionServiceClient",
    operations: &["Purchase"],
    retry_on_ack: true,
};

/// Registered so tax calls resolve to a contract; no operations are exposed
/// yet.
pub const TAX: CatalogEntry = CatalogEntry {
    key: "tax",
    service_path: "Commerce/Tax/TaxWebService.svc",
    contract_name: "Microsoft.CommerceTax.Interfaces.ITaxService",
    client_type: "TaxServiceClient",
    operations: &[],
    retry_on_ack: true,
};

/// Subscription commerce service. Its operations report through output
/// fields instead of an acknowledgement, so they are never retried.
pub const SCS: CatalogEntry = CatalogEntry {
    key: "scs",
    service_path: "scs/scsapiwebservice.asmx",
    contract_name: "SCSAPIWebService",
    client_type: "ScsApiClient",
    operations: &[],
    retry_on_ack: false,
};

pub static ENTRIES: [CatalogEntry; 5] = [ACCOUNT, PAYMENT_INSTRUMENT, TRANSACTION, TAX, SCS];

impl CatalogEntry {
    /// # Errors
    ///
    /// Returns an error if `host` does not form a valid HTTPS address.
    pub fn endpoint(&self, host: &str) -> Result<ServiceEndpointConfig, EndpointError> {
        ServiceEndpointConfig::for_service(host, self.service_path, self.contract_name, self.client_type)
    }

    fn contract(&self) -> ServiceContract {
        self.operations
            .iter()
            .fold(ServiceContract::new(self.client_type), |c, op| c.forwarding(op))
    }
}

#[must_use]
pub fn find(key: &str) -> Option<&'static CatalogEntry> {
    ENTRIES.iter().find(|e| e.key == key)
}

/// Contracts for every catalog entry, keyed by client type.
#[must_use]
pub fn registry() -> ContractRegistry {
    let mut registry = ContractRegistry::new();
    for entry in &ENTRIES {
        let contract = if entry.key == SCS.key {
            scs_contract(entry.contract())
        } else {
            entry.contract()
        };
        registry.register(contract);
    }
    registry
}

// ---------------------------------------------------------------------------
// SCS operations
// ---------------------------------------------------------------------------

/// Output fields of `GetStatementEx`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementResult {
    #[serde(rename = "ErrorXml", default)]
    pub error_xml: Option<String>,
    #[serde(rename = "AccountStatementInfoSetXml", default)]
    pub account_statement_info_set_xml: Option<String>,
    #[serde(rename = "UserNotificationSetXml", default)]
    pub user_notification_set_xml: Option<String>,
}

/// Output fields of `CreditPaymentInstrumentEx3`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditResult {
    #[serde(rename = "Error", default)]
    pub error: Option<String>,
}

fn scs_contract(contract: ServiceContract) -> ServiceContract {
    contract
        .typed("GetStatementEx", |channel, input: Value| {
            call_with_outputs::<StatementResult>(channel, "GetStatementEx", input)
        })
        .typed("CreditPaymentInstrumentEx3", |channel, input: Value| {
            call_with_outputs::<CreditResult>(channel, "CreditPaymentInstrumentEx3", input)
        })
}

async fn call_with_outputs<O: for<'de> Deserialize<'de>>(
    channel: Arc<dyn Channel>,
    operation: &'static str,
    input: Value,
) -> Result<O, Fault> {
    let reply = channel
        .call(operation, &[Param::named(format!("{operation}Input"), input)])
        .await?;
    serde_json::from_value(reply).map_err(|e| Fault::from_error(FaultKind::Marshal, &e))
}
