//! Authenticated client for the remote list service.
//!
//! # Design
//! `ZenkitClient` holds the base URL, the API key and a `Transport`; every
//! operation builds an `HttpRequest`, hands it to the transport and
//! interprets the `HttpResponse`. Multi-request flows live here too:
//! entry listing paginates with a skip/limit filter and accumulates pages,
//! batch delete resolves each uuid to its internal numeric id first.
//! Status interpretation is the client's job — the transport only fails
//! for connectivity reasons.

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Error;
use crate::fields;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport, UreqTransport};
use crate::types::{EntryPatch, Identity, List, Record, Workspace};

/// Production API endpoint.
pub const API_URL: &str = "https://zenkit.com/api/v1";

/// Page size for the entries filter endpoint.
pub const ENTRIES_LIMIT: usize = 100;

const API_KEY_HEADER: &str = "Zenkit-API-Key";

/// One page of the entries filter response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FilterPage {
    list_entries: Option<Vec<Record>>,
    count_data: CountData,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountData {
    filtered_total: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FilterRequest {
    filter: serde_json::Map<String, serde_json::Value>,
    group_by_element_id: u32,
    limit: usize,
    skip: usize,
    exclude: Vec<String>,
    allow_deprecated: bool,
    task_style: bool,
}

#[derive(Debug, Serialize)]
struct CreateEntryBody {
    uuid: Uuid,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteFilterBody {
    list_entry_ids: Vec<i64>,
}

/// Blocking client for the list service API.
pub struct ZenkitClient {
    base_url: String,
    api_key: String,
    transport: Box<dyn Transport>,
}

impl ZenkitClient {
    /// Client against the production endpoint over the default transport.
    pub fn new(api_key: &str) -> Self {
        Self::with_transport(API_URL, api_key, Box::new(UreqTransport::new()))
    }

    /// Client against an arbitrary endpoint and transport. Used by tests
    /// and by deployments fronting the service with a proxy.
    pub fn with_transport(base_url: &str, api_key: &str, transport: Box<dyn Transport>) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            transport,
        }
    }

    fn get(&self, path: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: format!("{}/{path}", self.base_url),
            headers: vec![(API_KEY_HEADER.to_string(), self.api_key.clone())],
            body: None,
        }
    }

    fn post(&self, path: &str, body: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}/{path}", self.base_url),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (API_KEY_HEADER.to_string(), self.api_key.clone()),
            ],
            body: Some(body),
        }
    }

    fn put(&self, path: &str, body: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Put,
            url: format!("{}/{path}", self.base_url),
            headers: vec![
                ("Content-Type".to_string(), "application/json".to_string()),
                (API_KEY_HEADER.to_string(), self.api_key.clone()),
            ],
            body: Some(body),
        }
    }

    fn execute(&self, request: HttpRequest) -> Result<HttpResponse, Error> {
        self.transport.execute(request)
    }

    /// Authenticate with the configured API key.
    ///
    /// A 401/403, or a 200 whose body is not an object with a `username`,
    /// means the credential was rejected (`Error::Auth`). Other error
    /// statuses and transport failures surface as retryable kinds so
    /// callers can distinguish "retry later" from "reconfigure".
    pub fn login(&self) -> Result<Identity, Error> {
        let response = self.execute(self.get("auth/currentuser"))?;
        if response.status == 401 || response.status == 403 {
            return Err(Error::Auth);
        }
        check_status(&response)?;
        serde_json::from_str::<Identity>(&response.body).map_err(|_| Error::Auth)
    }

    /// All lists across all workspaces the credential can see, flattened
    /// in the order the service returns them.
    pub fn get_lists(&self) -> Result<Vec<List>, Error> {
        let response = self.execute(self.get("users/me/workspacesWithLists"))?;
        check_status(&response)?;
        let workspaces: Vec<Workspace> = serde_json::from_str(&response.body)
            .map_err(|e| Error::Deserialization(e.to_string()))?;
        Ok(workspaces
            .into_iter()
            .flat_map(|workspace| workspace.lists)
            .collect())
    }

    /// All entries of a list, accumulated across filter pages.
    ///
    /// The service gives no atomic-snapshot guarantee: the reported total
    /// may shrink or grow between pages. That is an accepted consistency
    /// weakening, not an error — the loop just stops when the current page
    /// reaches the currently reported total.
    pub fn get_list_entries(&self, list_short_id: &str) -> Result<Vec<Record>, Error> {
        let mut entries = Vec::new();
        let mut skip = 0;
        loop {
            let page = self.fetch_entries_page(list_short_id, skip)?;
            let total = page.count_data.filtered_total;
            let Some(batch) = page.list_entries else {
                break;
            };
            if total == 0 {
                break;
            }
            entries.extend(batch);
            if skip + ENTRIES_LIMIT >= total {
                break;
            }
            skip += ENTRIES_LIMIT;
        }
        debug!("fetched {} entries for list {list_short_id}", entries.len());
        Ok(entries)
    }

    fn fetch_entries_page(&self, list_short_id: &str, skip: usize) -> Result<FilterPage, Error> {
        let body = FilterRequest {
            filter: serde_json::Map::new(),
            group_by_element_id: 0,
            limit: ENTRIES_LIMIT,
            skip,
            exclude: Vec::new(),
            allow_deprecated: false,
            task_style: false,
        };
        let body = serde_json::to_string(&body).map_err(|e| Error::Serialization(e.to_string()))?;
        let response =
            self.execute(self.post(&format!("lists/{list_short_id}/entries/filter/list"), body))?;
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Fetch a single entry. Both the list and the entry may be addressed
    /// by any of their ids (numeric, short or uuid).
    pub fn get_list_entry(&self, list_any_id: &str, entry_id: &str) -> Result<Record, Error> {
        let response = self.execute(self.get(&format!("lists/{list_any_id}/entries/{entry_id}")))?;
        check_status(&response)?;
        serde_json::from_str(&response.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Create an entry in two phases: a bare shell tagged with the
    /// client-generated uuid, then the requested fields via the update
    /// path. A phase-two failure leaves the shell in place (the service
    /// offers no transactional create) and surfaces as
    /// `Error::PartialCreate` so callers can reconcile rather than retry
    /// into a duplicate.
    pub fn create_entry(
        &self,
        list_short_id: &str,
        uuid: Uuid,
        patch: &EntryPatch,
    ) -> Result<(), Error> {
        let body = serde_json::to_string(&CreateEntryBody { uuid })
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let response = self.execute(self.post(&format!("lists/{list_short_id}/entries"), body))?;
        check_status(&response)?;

        self.update_entry(list_short_id, &uuid.to_string(), patch)
            .map_err(|err| Error::PartialCreate {
                uuid,
                reason: err.to_string(),
            })
    }

    /// Update exactly one logical field of an entry.
    ///
    /// Fetches the current record, resolves the logical field to a concrete
    /// field key via the naming heuristics, and issues a single-key PUT.
    pub fn update_entry(
        &self,
        list_short_id: &str,
        entry_id: &str,
        patch: &EntryPatch,
    ) -> Result<(), Error> {
        let record = self
            .get_list_entry(list_short_id, entry_id)
            .map_err(|err| Error::UpdateFailed(format!("failed to fetch entry {entry_id}: {err}")))?;
        let (field_key, value) = fields::resolve_update(&record, patch)?;

        let mut update = serde_json::Map::new();
        update.insert(field_key, value);
        let body = serde_json::to_string(&update).map_err(|e| Error::Serialization(e.to_string()))?;
        let response =
            self.execute(self.put(&format!("lists/{list_short_id}/entries/{entry_id}"), body))?;
        check_status(&response)
    }

    /// Soft-delete entries by uuid.
    ///
    /// The delete-filter endpoint wants internal numeric ids, so each uuid
    /// is resolved via a single-entry fetch first. Unresolvable uuids are
    /// logged and skipped; only a failure of the final batch call fails
    /// the operation.
    pub fn deprecate_entries(&self, list_any_id: &str, uuids: &[Uuid]) -> Result<(), Error> {
        let mut list_entry_ids = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            match self.get_list_entry(list_any_id, &uuid.to_string()) {
                Ok(record) => match record.entry_id() {
                    Some(id) => list_entry_ids.push(id),
                    None => warn!("entry {uuid} has no numeric id, skipping"),
                },
                Err(err) => warn!("failed to fetch entry {uuid}, skipping: {err}"),
            }
        }

        let body = serde_json::to_string(&DeleteFilterBody { list_entry_ids })
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let response =
            self.execute(self.post(&format!("lists/{list_any_id}/entries/delete/filter"), body))?;
        check_status(&response)
    }
}

/// The service answers every successful call with 200; anything else is a
/// failed read or write against that specific resource.
fn check_status(response: &HttpResponse) -> Result<(), Error> {
    if response.status == 200 {
        return Ok(());
    }
    Err(Error::Fetch {
        status: response.status,
        body: response.body.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::testing::ScriptedTransport;
    use serde_json::json;

    fn client(transport: &ScriptedTransport) -> ZenkitClient {
        ZenkitClient::with_transport("http://localhost:3000", "test-key", Box::new(transport.clone()))
    }

    fn entry(id: i64, uuid: &str, title: &str) -> serde_json::Value {
        json!({
            "id": id,
            "uuid": uuid,
            "displayString": title,
            "aaa_text": title
        })
    }

    fn filter_page(entries: Vec<serde_json::Value>, filtered_total: usize) -> String {
        json!({
            "listEntries": entries,
            "countData": {"filteredTotal": filtered_total, "total": filtered_total}
        })
        .to_string()
    }

    fn numbered_entries(range: std::ops::Range<usize>) -> Vec<serde_json::Value> {
        range
            .map(|i| entry(i as i64, &Uuid::nil().to_string(), &format!("Task {i}")))
            .collect()
    }

    #[test]
    fn requests_carry_api_key_header() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, json!({"username": "tester"}).to_string());
        client(&transport).login().unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].url, "http://localhost:3000/auth/currentuser");
        assert!(requests[0]
            .headers
            .iter()
            .any(|(k, v)| k == "Zenkit-API-Key" && v == "test-key"));
    }

    #[test]
    fn login_without_username_is_auth_error() {
        let transport = ScriptedTransport::new();
        transport.push_ok(200, json!({"id": 7}).to_string());
        let err = client(&transport).login().unwrap_err();
        assert!(matches!(err, Error::Auth));
    }

    #[test]
    fn login_rejected_status_is_auth_error() {
        let transport = ScriptedTransport::new();
        transport.push_ok(401, json!({"error": "unauthorized"}).to_string());
        let err = client(&transport).login().unwrap_err();
        assert!(matches!(err, Error::Auth));
    }

    #[test]
    fn login_server_outage_is_retryable_not_auth() {
        let transport = ScriptedTransport::new();
        transport.push_ok(503, "<html>Service Unavailable</html>".to_string());
        let err = client(&transport).login().unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 503, .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn login_transport_failure_is_connectivity_not_auth() {
        let transport = ScriptedTransport::new();
        transport.push_err(Error::Connectivity("timed out".to_string()));
        let err = client(&transport).login().unwrap_err();
        assert!(matches!(err, Error::Connectivity(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn get_lists_flattens_workspaces_in_order() {
        let transport = ScriptedTransport::new();
        transport.push_ok(
            200,
            json!([
                {"id": 1, "name": "Work", "lists": [
                    {"id": 10, "shortId": "w-a", "uuid": Uuid::nil(), "name": "Alpha"},
                ]},
                {"id": 2, "name": "Home", "lists": [
                    {"id": 20, "shortId": "h-b", "uuid": Uuid::nil(), "name": "Beta", "iconClassNames": "fa fa-tree"},
                    {"id": 21, "shortId": "h-c", "uuid": Uuid::nil(), "name": "Gamma"},
                ]},
            ])
            .to_string(),
        );
        let lists = client(&transport).get_lists().unwrap();
        let short_ids: Vec<&str> = lists.iter().map(|l| l.short_id.as_str()).collect();
        assert_eq!(short_ids, vec!["w-a", "h-b", "h-c"]);
        assert_eq!(lists[1].icon_class_names.as_deref(), Some("fa fa-tree"));
    }

    // Pagination request counts for totals around the page-size boundary:
    // T entries at page size P must come back complete in ceil(T/P)
    // requests (one request when T == 0).
    #[test]
    fn pagination_request_counts() {
        for total in [0usize, 1, ENTRIES_LIMIT, ENTRIES_LIMIT + 1, 3 * ENTRIES_LIMIT] {
            let transport = ScriptedTransport::new();
            let mut skip = 0;
            loop {
                let upper = (skip + ENTRIES_LIMIT).min(total);
                transport.push_ok(200, filter_page(numbered_entries(skip..upper), total));
                if skip + ENTRIES_LIMIT >= total {
                    break;
                }
                skip += ENTRIES_LIMIT;
            }

            let entries = client(&transport).get_list_entries("inbox-1").unwrap();
            assert_eq!(entries.len(), total, "total {total}: entry count");
            let expected_requests = std::cmp::max(1, total.div_ceil(ENTRIES_LIMIT));
            assert_eq!(
                transport.request_count(),
                expected_requests,
                "total {total}: request count"
            );

            // Page order is preserved across accumulation.
            let titles: Vec<Option<&str>> =
                entries.iter().map(|r| r.display_string()).collect();
            let expected: Vec<String> = (0..total).map(|i| format!("Task {i}")).collect();
            assert_eq!(
                titles,
                expected.iter().map(|t| Some(t.as_str())).collect::<Vec<_>>(),
                "total {total}: order"
            );
        }
    }

    #[test]
    fn pagination_requests_advance_skip() {
        let total = 2 * ENTRIES_LIMIT + 1;
        let transport = ScriptedTransport::new();
        transport.push_ok(200, filter_page(numbered_entries(0..ENTRIES_LIMIT), total));
        transport.push_ok(
            200,
            filter_page(numbered_entries(ENTRIES_LIMIT..2 * ENTRIES_LIMIT), total),
        );
        transport.push_ok(
            200,
            filter_page(numbered_entries(2 * ENTRIES_LIMIT..total), total),
        );

        client(&transport).get_list_entries("inbox-1").unwrap();

        let skips: Vec<u64> = transport
            .requests()
            .iter()
            .map(|req| {
                let body: serde_json::Value =
                    serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
                assert_eq!(body["limit"], ENTRIES_LIMIT);
                assert_eq!(body["allowDeprecated"], false);
                body["skip"].as_u64().unwrap()
            })
            .collect();
        assert_eq!(skips, vec![0, ENTRIES_LIMIT as u64, 2 * ENTRIES_LIMIT as u64]);
    }

    #[test]
    fn null_entries_page_terminates_accumulation() {
        let transport = ScriptedTransport::new();
        transport.push_ok(
            200,
            json!({"listEntries": null, "countData": {"filteredTotal": 250}}).to_string(),
        );
        let entries = client(&transport).get_list_entries("inbox-1").unwrap();
        assert!(entries.is_empty());
        assert_eq!(transport.request_count(), 1);
    }

    #[test]
    fn filter_error_status_is_fetch_error() {
        let transport = ScriptedTransport::new();
        transport.push_ok(500, "internal error".to_string());
        let err = client(&transport).get_list_entries("inbox-1").unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 500, .. }));
    }

    #[test]
    fn update_entry_issues_single_key_put() {
        let uuid = Uuid::new_v4();
        let transport = ScriptedTransport::new();
        transport.push_ok(200, entry(1, &uuid.to_string(), "Buy milk").to_string());
        transport.push_ok(200, "{}".to_string());

        client(&transport)
            .update_entry("inbox-1", &uuid.to_string(), &EntryPatch::name("Buy oat milk"))
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].method, HttpMethod::Put);
        assert_eq!(
            requests[1].url,
            format!("http://localhost:3000/lists/inbox-1/entries/{uuid}")
        );
        let body: serde_json::Value =
            serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"aaa_text": "Buy oat milk"}));
    }

    #[test]
    fn update_entry_unfetchable_record_is_update_failed() {
        let transport = ScriptedTransport::new();
        transport.push_ok(404, "not found".to_string());
        let err = client(&transport)
            .update_entry("inbox-1", "missing", &EntryPatch::name("x"))
            .unwrap_err();
        assert!(matches!(err, Error::UpdateFailed(_)));
    }

    #[test]
    fn create_entry_runs_two_phases() {
        let uuid = Uuid::new_v4();
        let transport = ScriptedTransport::new();
        // Phase 1: bare shell comes back without a display string.
        transport.push_ok(
            200,
            json!({"id": 1, "uuid": uuid, "displayString": null, "aaa_text": null}).to_string(),
        );
        // Phase 2: fetch for resolution, then the PUT.
        transport.push_ok(
            200,
            json!({"id": 1, "uuid": uuid, "displayString": null, "aaa_text": null}).to_string(),
        );
        transport.push_ok(200, "{}".to_string());

        client(&transport)
            .create_entry("inbox-1", uuid, &EntryPatch::name("Buy milk"))
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].method, HttpMethod::Post);
        let shell: serde_json::Value =
            serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(shell, json!({"uuid": uuid}));
        assert_eq!(requests[2].method, HttpMethod::Put);
    }

    #[test]
    fn create_entry_phase_two_failure_is_partial_create() {
        let uuid = Uuid::new_v4();
        let transport = ScriptedTransport::new();
        transport.push_ok(
            200,
            json!({"id": 1, "uuid": uuid, "displayString": null, "aaa_text": null}).to_string(),
        );
        transport.push_ok(500, "boom".to_string());

        let err = client(&transport)
            .create_entry("inbox-1", uuid, &EntryPatch::name("Buy milk"))
            .unwrap_err();
        assert!(matches!(err, Error::PartialCreate { uuid: u, .. } if u == uuid));
    }

    #[test]
    fn deprecate_skips_unresolvable_uuids() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let transport = ScriptedTransport::new();
        transport.push_ok(200, entry(11, &a.to_string(), "A").to_string());
        transport.push_ok(404, "not found".to_string());
        transport.push_ok(200, entry(13, &c.to_string(), "C").to_string());
        transport.push_ok(200, "{}".to_string());

        client(&transport)
            .deprecate_entries("42", &[a, b, c])
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 4);
        let batch: serde_json::Value =
            serde_json::from_str(requests[3].body.as_deref().unwrap()).unwrap();
        assert_eq!(batch, json!({"listEntryIds": [11, 13]}));
    }

    #[test]
    fn deprecate_fails_only_on_the_batch_call() {
        let a = Uuid::new_v4();
        let transport = ScriptedTransport::new();
        transport.push_ok(200, entry(11, &a.to_string(), "A").to_string());
        transport.push_ok(500, "boom".to_string());

        let err = client(&transport).deprecate_entries("42", &[a]).unwrap_err();
        assert!(matches!(err, Error::Fetch { status: 500, .. }));
    }
}
