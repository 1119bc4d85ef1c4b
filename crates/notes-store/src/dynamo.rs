//! DynamoDB note store.
//!
//! Table layout:
//! - partition key `user_id` (S), sort key `timestamp` (N)
//! - global secondary index (default `note_id-index`) with hash key `note_id` (S)
//!
//! Items are converted attribute by attribute. JSON numbers become `N`
//! attributes holding their exact decimal text, and come back as numbers
//! with that same text.

use std::collections::HashMap;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, meta::region::RegionProviderChain};
use aws_sdk_dynamodb::{
    Client,
    config::{Region, http::HttpResponse},
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
    operation::RequestId,
    types::AttributeValue,
};
use notes_core::{Item, NoteKey, attr};
use serde_json::{Number, Value};

use crate::error::{StoreError, StoreFault, StoreResult};
use crate::store::{Condition, NoteStore, Page, Query, StoreConfig};

/// Region used when neither the configuration nor the environment names one.
pub const DEFAULT_REGION: &str = "us-east-1";

type Attributes = HashMap<String, AttributeValue>;

/// [`NoteStore`] backed by a DynamoDB table.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
    table_name: String,
}

impl DynamoStore {
    /// Build an SDK client from `config` and the ambient AWS environment.
    pub async fn connect(config: &StoreConfig) -> StoreResult<Self> {
        let region_provider = RegionProviderChain::first_try(config.region.clone().map(Region::new))
            .or_default_provider()
            .or_else(Region::new(DEFAULT_REGION));

        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);
        if let Some(url) = &config.endpoint_url {
            tracing::info!(endpoint = %url, "Using DynamoDB endpoint override");
            loader = loader.endpoint_url(url.as_str());
        }
        let sdk_config = loader.load().await;

        Ok(Self::from_client(
            Client::new(&sdk_config),
            config.table_name.clone(),
        ))
    }

    /// Wrap an existing SDK client.
    pub fn from_client(client: Client, table_name: impl Into<String>) -> Self {
        Self {
            client,
            table_name: table_name.into(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }
}

#[async_trait]
impl NoteStore for DynamoStore {
    fn backend(&self) -> &'static str {
        "dynamodb"
    }

    async fn put(&self, item: &Item) -> StoreResult<()> {
        self.client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_attributes(item)))
            .send()
            .await
            .map_err(|e| classify("put_item", e))?;
        Ok(())
    }

    async fn put_if(&self, item: &Item, condition: &Condition) -> StoreResult<()> {
        let mut request = self
            .client
            .put_item()
            .table_name(&self.table_name)
            .set_item(Some(to_attributes(item)));

        let mut clauses = Vec::new();
        for (i, (attribute, value)) in condition.equalities().iter().enumerate() {
            clauses.push(format!("#c{i} = :c{i}"));
            request = request
                .expression_attribute_names(format!("#c{i}"), attribute)
                .expression_attribute_values(format!(":c{i}"), to_attribute(value));
        }
        let expression = if clauses.is_empty() {
            request = request.expression_attribute_names("#c", attr::USER_ID);
            "attribute_exists(#c)".to_string()
        } else {
            clauses.join(" AND ")
        };

        request
            .condition_expression(expression)
            .send()
            .await
            .map_err(|e| classify("put_item", e))?;
        Ok(())
    }

    async fn delete(&self, key: &NoteKey) -> StoreResult<()> {
        self.client
            .delete_item()
            .table_name(&self.table_name)
            .set_key(Some(to_attributes(&key.to_item())))
            .send()
            .await
            .map_err(|e| classify("delete_item", e))?;
        Ok(())
    }

    async fn query(&self, query: &Query) -> StoreResult<Page> {
        // `timestamp` is a reserved word, so every name goes through a placeholder
        let mut request = self
            .client
            .query()
            .table_name(&self.table_name)
            .set_index_name(query.index.clone())
            .key_condition_expression("#k = :k")
            .expression_attribute_names("#k", &query.key.attribute)
            .expression_attribute_values(":k", AttributeValue::S(query.key.value.clone()))
            .scan_index_forward(query.scan_forward)
            .set_limit(query.limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX)));

        if let Some(start) = &query.exclusive_start_key {
            request = request.set_exclusive_start_key(Some(to_attributes(&start.to_item())));
        }

        let output = request.send().await.map_err(|e| classify("query", e))?;

        let items = output
            .items()
            .iter()
            .map(|raw| from_attributes(raw.clone()))
            .collect::<StoreResult<Vec<Item>>>()?;

        let last_evaluated_key = output
            .last_evaluated_key()
            .map(|raw| from_attributes(raw.clone()))
            .transpose()?;

        tracing::debug!(
            table = %self.table_name,
            index = ?query.index,
            returned = items.len(),
            more = last_evaluated_key.is_some(),
            "Query complete"
        );

        Ok(Page::new(items, last_evaluated_key))
    }
}

fn to_attributes(item: &Item) -> Attributes {
    item.iter()
        .map(|(name, value)| (name.clone(), to_attribute(value)))
        .collect()
}

fn to_attribute(value: &Value) -> AttributeValue {
    match value {
        Value::Null => AttributeValue::Null(true),
        Value::Bool(b) => AttributeValue::Bool(*b),
        Value::Number(n) => AttributeValue::N(n.to_string()),
        Value::String(s) => AttributeValue::S(s.clone()),
        Value::Array(values) => AttributeValue::L(values.iter().map(to_attribute).collect()),
        Value::Object(map) => AttributeValue::M(to_attributes(map)),
    }
}

fn from_attributes(raw: Attributes) -> StoreResult<Item> {
    raw.into_iter()
        .map(|(name, value)| Ok((name, from_attribute(value)?)))
        .collect()
}

fn from_attribute(raw: AttributeValue) -> StoreResult<Value> {
    Ok(match raw {
        AttributeValue::S(s) => Value::String(s),
        AttributeValue::N(n) => Value::Number(parse_number(&n)?),
        AttributeValue::Bool(b) => Value::Bool(b),
        AttributeValue::Null(_) => Value::Null,
        AttributeValue::L(values) => Value::Array(
            values
                .into_iter()
                .map(from_attribute)
                .collect::<StoreResult<_>>()?,
        ),
        AttributeValue::M(map) => Value::Object(from_attributes(map)?),
        AttributeValue::Ss(values) => Value::Array(values.into_iter().map(Value::String).collect()),
        AttributeValue::Ns(values) => Value::Array(
            values
                .iter()
                .map(|n| parse_number(n).map(Value::Number))
                .collect::<StoreResult<_>>()?,
        ),
        other => {
            return Err(StoreError::Serialization(format!(
                "unsupported attribute type: {:?}",
                other
            )));
        }
    })
}

/// Number attributes keep their decimal text exactly.
fn parse_number(text: &str) -> StoreResult<Number> {
    text.parse::<Number>()
        .map_err(|e| StoreError::Serialization(format!("number attribute '{}': {}", text, e)))
}

/// Map an SDK failure onto the store's error taxonomy.
///
/// Only service errors carry a code; anything that never got a parsed
/// response from DynamoDB is a transport failure.
fn classify<E>(operation: &'static str, err: SdkError<E, HttpResponse>) -> StoreError
where
    E: ProvideErrorMetadata + RequestId + std::error::Error + Send + Sync + 'static,
{
    let Some(service_err) = err.as_service_error() else {
        return StoreError::Transport(format!("{}: {}", operation, DisplayErrorContext(&err)));
    };

    let status = err
        .raw_response()
        .map(|response| response.status().as_u16())
        .unwrap_or(500);

    let mut fault = StoreFault::new(
        service_err.code().unwrap_or("Unknown"),
        service_err.message().unwrap_or_default(),
        status,
    );
    if let Some(request_id) = service_err.request_id() {
        fault = fault.with_request_id(request_id);
    }

    tracing::debug!(operation, %fault, "DynamoDB request failed");
    StoreError::from_fault(fault)
}
