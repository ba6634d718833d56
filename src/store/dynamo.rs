use anyhow::{anyhow, Context, Result};
use aws_sdk_dynamodb::operation::get_item::builders::GetItemFluentBuilder;
use aws_sdk_dynamodb::operation::put_item::builders::PutItemFluentBuilder;
use aws_sdk_dynamodb::operation::put_item::PutItemError;
use aws_sdk_dynamodb::operation::update_item::builders::UpdateItemFluentBuilder;
use aws_sdk_dynamodb::operation::update_item::UpdateItemError;
use aws_sdk_dynamodb::types::{AttributeValue, Select};
use aws_sdk_dynamodb::Client;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

use crate::model::{ListFilter, Listing, StoreStats, StoredListing};
use crate::store::ListingStore;

type Item = HashMap<String, AttributeValue>;

/// DynamoDB backend: one item per listing id (partition key `id`, type S).
///
/// `exists` is a strongly consistent `GetItem`; that read decides "new" and a stale
/// answer would mean a duplicate digest. Aggregates use eventually consistent scans.
pub struct DynamoStore {
    client: Client,
    table: String,
}

impl DynamoStore {
    pub async fn connect(table: &str, region: &str) -> Self {
        tracing::info!(target: "store", table, region, "initializing dynamodb client");
        let conf = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region.to_string()))
            .load()
            .await;
        Self::with_client(Client::new(&conf), table)
    }

    pub fn with_client(client: Client, table: &str) -> Self {
        Self {
            client,
            table: table.to_string(),
        }
    }

    /// Paginated scan; `filter` restricts on the `notified` attribute.
    async fn scan_items(&self, filter: ListFilter) -> Result<Vec<Item>> {
        let mut out = Vec::new();
        let mut start_key: Option<Item> = None;
        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table)
                .set_exclusive_start_key(start_key.take());
            if let Some(flag) = notified_filter(filter) {
                req = req
                    .filter_expression("notified = :n")
                    .expression_attribute_values(":n", AttributeValue::Bool(flag));
            }
            let page = req
                .send()
                .await
                .with_context(|| format!("dynamodb scan on {}", self.table))?;
            out.extend(page.items.unwrap_or_default());
            match page.last_evaluated_key {
                Some(k) if !k.is_empty() => start_key = Some(k),
                _ => break,
            }
        }
        Ok(out)
    }

    async fn count(&self, filter: ListFilter) -> Result<u64> {
        let mut total = 0u64;
        let mut start_key: Option<Item> = None;
        loop {
            let mut req = self
                .client
                .scan()
                .table_name(&self.table)
                .select(Select::Count)
                .set_exclusive_start_key(start_key.take());
            if let Some(flag) = notified_filter(filter) {
                req = req
                    .filter_expression("notified = :n")
                    .expression_attribute_values(":n", AttributeValue::Bool(flag));
            }
            let page = req
                .send()
                .await
                .with_context(|| format!("dynamodb count on {}", self.table))?;
            total += page.count.max(0) as u64;
            match page.last_evaluated_key {
                Some(k) if !k.is_empty() => start_key = Some(k),
                _ => break,
            }
        }
        Ok(total)
    }

    fn decode_all(items: Vec<Item>) -> Result<Vec<StoredListing>> {
        items.iter().map(item_to_stored).collect()
    }
}

fn notified_filter(filter: ListFilter) -> Option<bool> {
    match filter {
        ListFilter::All => None,
        ListFilter::Notified => Some(true),
        ListFilter::Unnotified => Some(false),
    }
}

fn ts_to_attr(ts: &DateTime<Utc>) -> AttributeValue {
    AttributeValue::S(ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn opt_s(v: &Option<String>) -> Option<AttributeValue> {
    v.as_ref().map(|s| AttributeValue::S(s.clone()))
}

fn opt_n(v: Option<f64>) -> Option<AttributeValue> {
    v.filter(|n| n.is_finite())
        .map(|n| AttributeValue::N(n.to_string()))
}

/// Build the item written by `insert_new`. Absent optionals are left out of the item.
pub fn listing_to_item(listing: &Listing, first_seen: DateTime<Utc>) -> Item {
    let mut item = Item::new();
    item.insert("id".into(), AttributeValue::S(listing.id.clone()));
    item.insert("title".into(), AttributeValue::S(listing.title.clone()));
    item.insert("company".into(), AttributeValue::S(listing.company.clone()));
    item.insert("url".into(), AttributeValue::S(listing.url.clone()));
    item.insert("first_seen".into(), ts_to_attr(&first_seen));
    item.insert("notified".into(), AttributeValue::Bool(false));

    let optionals = [
        ("location", opt_s(&listing.location)),
        ("description", opt_s(&listing.description)),
        ("posted_at", listing.posted_at.as_ref().map(ts_to_attr)),
        ("salary_min", opt_n(listing.salary_min)),
        ("salary_max", opt_n(listing.salary_max)),
    ];
    for (key, value) in optionals {
        if let Some(v) = value {
            item.insert(key.into(), v);
        }
    }
    item
}

fn req_s(item: &Item, key: &str) -> Result<String> {
    match item.get(key) {
        Some(AttributeValue::S(s)) => Ok(s.clone()),
        Some(other) => Err(anyhow!("attribute `{key}` has unexpected type: {other:?}")),
        None => Err(anyhow!("attribute `{key}` missing")),
    }
}

fn get_s(item: &Item, key: &str) -> Option<String> {
    match item.get(key) {
        Some(AttributeValue::S(s)) => Some(s.clone()),
        _ => None,
    }
}

fn get_n(item: &Item, key: &str) -> Option<f64> {
    match item.get(key) {
        Some(AttributeValue::N(n)) => n.parse().ok(),
        _ => None,
    }
}

fn parse_ts(key: &str, s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("attribute `{key}` is not RFC 3339: {s}"))
}

pub fn item_to_stored(item: &Item) -> Result<StoredListing> {
    let id = req_s(item, "id")?;
    let posted_at = get_s(item, "posted_at")
        .map(|s| parse_ts("posted_at", &s))
        .transpose()?;
    let first_seen = parse_ts("first_seen", &req_s(item, "first_seen")?)?;
    let notified = matches!(item.get("notified"), Some(AttributeValue::Bool(true)));

    Ok(StoredListing {
        listing: Listing {
            title: req_s(item, "title").with_context(|| format!("listing {id}"))?,
            company: req_s(item, "company").with_context(|| format!("listing {id}"))?,
            location: get_s(item, "location"),
            url: req_s(item, "url").with_context(|| format!("listing {id}"))?,
            description: get_s(item, "description"),
            posted_at,
            salary_min: get_n(item, "salary_min"),
            salary_max: get_n(item, "salary_max"),
            id,
        },
        first_seen,
        notified,
    })
}

/// A failed `attribute_not_exists(id)` put means the id is already stored.
fn insert_outcome(err: PutItemError) -> Result<bool> {
    if err.is_conditional_check_failed_exception() {
        Ok(false)
    } else {
        Err(anyhow::Error::new(err))
    }
}

/// A failed `attribute_exists(id)` update means the id is unknown: a no-op.
fn mark_outcome(err: UpdateItemError) -> Result<()> {
    if err.is_conditional_check_failed_exception() {
        Ok(())
    } else {
        Err(anyhow::Error::new(err))
    }
}

impl DynamoStore {
    fn exists_request(&self, id: &str) -> GetItemFluentBuilder {
        self.client
            .get_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .consistent_read(true)
            .projection_expression("id")
    }

    fn insert_request(&self, listing: &Listing, first_seen: DateTime<Utc>) -> PutItemFluentBuilder {
        self.client
            .put_item()
            .table_name(&self.table)
            .set_item(Some(listing_to_item(listing, first_seen)))
            .condition_expression("attribute_not_exists(id)")
    }

    fn mark_request(&self, id: &str) -> UpdateItemFluentBuilder {
        self.client
            .update_item()
            .table_name(&self.table)
            .key("id", AttributeValue::S(id.to_string()))
            .update_expression("SET notified = :t")
            .condition_expression("attribute_exists(id)")
            .expression_attribute_values(":t", AttributeValue::Bool(true))
    }
}

#[async_trait::async_trait]
impl ListingStore for DynamoStore {
    async fn exists(&self, id: &str) -> Result<bool> {
        let out = self
            .exists_request(id)
            .send()
            .await
            .with_context(|| format!("dynamodb get_item({id})"))?;
        Ok(out.item.is_some_and(|item| !item.is_empty()))
    }

    async fn insert_new(&self, listing: &Listing) -> Result<bool> {
        match self.insert_request(listing, Utc::now()).send().await {
            Ok(_) => Ok(true),
            Err(e) => insert_outcome(e.into_service_error())
                .with_context(|| format!("dynamodb put_item({})", listing.id)),
        }
    }

    async fn mark_notified(&self, id: &str) -> Result<()> {
        match self.mark_request(id).send().await {
            Ok(_) => Ok(()),
            Err(e) => mark_outcome(e.into_service_error())
                .with_context(|| format!("dynamodb update_item({id})")),
        }
    }

    async fn stats(&self) -> Result<StoreStats> {
        let total = self.count(ListFilter::All).await?;
        let notified = self.count(ListFilter::Notified).await?;
        Ok(StoreStats::from_counts(total, notified))
    }

    async fn all_unnotified(&self) -> Result<Vec<StoredListing>> {
        let mut rows = Self::decode_all(self.scan_items(ListFilter::Unnotified).await?)?;
        rows.sort_by(|a, b| {
            a.first_seen
                .cmp(&b.first_seen)
                .then_with(|| a.listing.id.cmp(&b.listing.id))
        });
        Ok(rows)
    }

    async fn list(&self, filter: ListFilter) -> Result<Vec<StoredListing>> {
        let mut rows = Self::decode_all(self.scan_items(filter).await?)?;
        rows.sort_by(|a, b| {
            b.first_seen
                .cmp(&a.first_seen)
                .then_with(|| b.listing.id.cmp(&a.listing.id))
        });
        Ok(rows)
    }

    fn backend(&self) -> &'static str {
        "dynamodb"
    }
}
