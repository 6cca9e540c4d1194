//! Minimal CalDAV client over blocking HTTP.
//!
//! Discovery follows RFC 4791 / RFC 5397: `current-user-principal` on the
//! configured URL, then `calendar-home-set` on the principal, then a Depth 1
//! listing of the home set to find the calendar by display name. Events are
//! fetched with `calendar-query` REPORTs and written as `<uid>.ics` resources.

use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use justcal_core::{CalError, Event};
use quick_xml::events::Event as XmlEvent;
use quick_xml::Reader;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{CONTENT_TYPE, IF_MATCH, IF_NONE_MATCH};
use reqwest::{Method, StatusCode, Url};
use thiserror::Error;

use crate::config::CalDavSettings;

const TIMEOUT: Duration = Duration::from_secs(30);
const MAX_LISTED_MATCHES: usize = 5;

const PRINCIPAL_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:current-user-principal/></d:prop>
</d:propfind>"#;

const HOME_SET_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><c:calendar-home-set/></d:prop>
</d:propfind>"#;

const CALENDARS_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<d:propfind xmlns:d="DAV:">
  <d:prop><d:displayname/><d:resourcetype/></d:prop>
</d:propfind>"#;

const ALL_EVENTS_QUERY: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop><d:getetag/><c:calendar-data/></d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT"/>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Failed to connect to CalDAV server: {0}")]
    Connection(String),

    #[error("Calendar '{name}' not found. Available calendars: {}", .available.join(", "))]
    CalendarNotFound { name: String, available: Vec<String> },

    #[error("Event with UID '{0}' not found")]
    EventNotFound(String),

    #[error("Partial UID '{prefix}' matches multiple events: {}. Please provide more characters.", .matches.join(", "))]
    AmbiguousUid { prefix: String, matches: Vec<String> },

    #[error("{action} failed: server returned {status}")]
    Status { action: String, status: StatusCode },

    #[error("Invalid server response: {0}")]
    Response(String),

    #[error(transparent)]
    Cal(#[from] CalError),
}

pub type Result<T> = std::result::Result<T, ClientError>;

/// An event together with the resource it was read from.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    pub event: Event,
    pub href: Url,
    pub etag: Option<String>,
}

/// A connected client bound to one calendar collection.
pub struct CalDavClient {
    http: Client,
    username: String,
    password: String,
    calendar: Url,
    tz: Tz,
}

impl CalDavClient {
    /// Discover the configured calendar.
    ///
    /// # Errors
    /// `Authentication` on 401/403, `CalendarNotFound` when no calendar has
    /// the configured display name, `Connection` for transport failures.
    pub fn connect(settings: &CalDavSettings, password: String, tz: Tz) -> Result<Self> {
        if settings.url.is_empty() || settings.username.is_empty() {
            return Err(ClientError::Connection(
                "CalDAV URL and username must be configured".to_string(),
            ));
        }
        let base = Url::parse(&settings.url)
            .map_err(|e| ClientError::Connection(format!("invalid URL '{}': {e}", settings.url)))?;
        let http = Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| ClientError::Connection(e.to_string()))?;

        let mut client = Self {
            http,
            username: settings.username.clone(),
            password,
            calendar: base.clone(),
            tz,
        };

        let principal = client
            .propfind(&base, "0", PRINCIPAL_QUERY)?
            .into_iter()
            .find_map(|r| r.principal_href)
            .map(|href| join(&base, &href))
            .transpose()?
            .unwrap_or_else(|| base.clone());
        tracing::debug!(%principal, "found principal");

        let home = client
            .propfind(&principal, "0", HOME_SET_QUERY)?
            .into_iter()
            .find_map(|r| r.home_href)
            .map(|href| join(&base, &href))
            .transpose()?
            .unwrap_or(principal);
        tracing::debug!(%home, "found calendar home");

        let calendars: Vec<DavResponse> = client
            .propfind(&home, "1", CALENDARS_QUERY)?
            .into_iter()
            .filter(|r| r.is_calendar)
            .collect();
        let selected = calendars
            .iter()
            .find(|r| r.displayname.as_deref() == Some(settings.calendar.as_str()));
        let Some(selected) = selected else {
            return Err(ClientError::CalendarNotFound {
                name: settings.calendar.clone(),
                available: calendars.iter().filter_map(|r| r.displayname.clone()).collect(),
            });
        };

        client.calendar = join(&base, &selected.href)?;
        tracing::info!(calendar = %client.calendar, "connected to calendar");
        Ok(client)
    }

    /// Events overlapping `[from, to]`, recurrences expanded by the server,
    /// sorted by start.
    pub fn list_events(&self, from: DateTime<Tz>, to: DateTime<Tz>) -> Result<Vec<Event>> {
        if from > to {
            return Ok(Vec::new());
        }
        let body = time_range_query(from.with_timezone(&Utc), to.with_timezone(&Utc));
        let mut events: Vec<Event> = self
            .report(&body)?
            .into_iter()
            .filter_map(|r| r.calendar_data)
            .flat_map(|data| match Event::all_from_ical(&data, self.tz) {
                Ok(events) => events,
                Err(e) => {
                    tracing::warn!(error = %e, "skipping unreadable calendar object");
                    Vec::new()
                }
            })
            .collect();
        events.sort_by_key(|e| e.start);
        tracing::info!(count = events.len(), "listed events");
        Ok(events)
    }

    /// Create a new resource; fails if one already exists for the UID.
    pub fn add_event(&self, event: &Event) -> Result<()> {
        let href = self.calendar_join(&format!("{}.ics", event.uid))?;
        let request = self
            .request(Method::PUT, &href)
            .header(IF_NONE_MATCH, "*")
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .body(event.to_ical());
        self.send(request, "Add event")?;
        tracing::info!(uid = %event.uid, %href, "created event");
        Ok(())
    }

    /// Look up an event by exact UID or unique UID prefix.
    pub fn find_event(&self, uid: &str) -> Result<StoredEvent> {
        let stored = self
            .report(ALL_EVENTS_QUERY)?
            .into_iter()
            .filter_map(|r| {
                let data = r.calendar_data?;
                match Event::from_ical(&data, self.tz) {
                    Ok(event) => Some((r.href, r.etag, event)),
                    Err(e) => {
                        tracing::warn!(href = %r.href, error = %e, "skipping unreadable calendar object");
                        None
                    }
                }
            })
            .map(|(href, etag, event)| -> Result<StoredEvent> {
                Ok(StoredEvent {
                    event,
                    href: self.calendar_join(&href)?,
                    etag,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        select_by_uid(stored, uid)
    }

    /// Replace the stored resource with `event`.
    pub fn update_event(&self, stored: &StoredEvent, event: &Event) -> Result<()> {
        let mut request = self
            .request(Method::PUT, &stored.href)
            .header(CONTENT_TYPE, "text/calendar; charset=utf-8")
            .body(event.to_ical());
        if let Some(etag) = &stored.etag {
            request = request.header(IF_MATCH, etag);
        }
        self.send(request, "Update event")?;
        tracing::info!(uid = %event.uid, href = %stored.href, "updated event");
        Ok(())
    }

    pub fn delete_event(&self, stored: &StoredEvent) -> Result<()> {
        let mut request = self.request(Method::DELETE, &stored.href);
        if let Some(etag) = &stored.etag {
            request = request.header(IF_MATCH, etag);
        }
        self.send(request, "Delete event")?;
        tracing::info!(uid = %stored.event.uid, href = %stored.href, "deleted event");
        Ok(())
    }

    fn propfind(&self, url: &Url, depth: &str, body: &str) -> Result<Vec<DavResponse>> {
        let request = self
            .request(dav_method("PROPFIND")?, url)
            .header("Depth", depth)
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(body.to_string());
        parse_multistatus(&self.send(request, "PROPFIND")?)
    }

    fn report(&self, body: &str) -> Result<Vec<DavResponse>> {
        let request = self
            .request(dav_method("REPORT")?, &self.calendar)
            .header("Depth", "1")
            .header(CONTENT_TYPE, "application/xml; charset=utf-8")
            .body(body.to_string());
        parse_multistatus(&self.send(request, "REPORT")?)
    }

    fn request(&self, method: Method, url: &Url) -> RequestBuilder {
        tracing::debug!(%method, %url, "caldav request");
        self.http
            .request(method, url.clone())
            .basic_auth(&self.username, Some(&self.password))
    }

    fn send(&self, request: RequestBuilder, action: &str) -> Result<String> {
        let response = request
            .send()
            .map_err(|e| ClientError::Connection(e.to_string()))?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ClientError::Authentication(format!(
                "{action} rejected with {status}"
            )));
        }
        if !status.is_success() {
            return Err(ClientError::Status {
                action: action.to_string(),
                status,
            });
        }
        response
            .text()
            .map_err(|e| ClientError::Connection(e.to_string()))
    }

    fn calendar_join(&self, href: &str) -> Result<Url> {
        join(&self.calendar, href)
    }
}

fn dav_method(name: &str) -> Result<Method> {
    Method::from_bytes(name.as_bytes()).map_err(|e| ClientError::Connection(e.to_string()))
}

fn join(base: &Url, href: &str) -> Result<Url> {
    base.join(href)
        .map_err(|e| ClientError::Response(format!("bad href '{href}': {e}")))
}

fn time_range_query(from: DateTime<Utc>, to: DateTime<Utc>) -> String {
    let start = from.format("%Y%m%dT%H%M%SZ");
    let end = to.format("%Y%m%dT%H%M%SZ");
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<c:calendar-query xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav">
  <d:prop>
    <d:getetag/>
    <c:calendar-data>
      <c:expand start="{start}" end="{end}"/>
    </c:calendar-data>
  </d:prop>
  <c:filter>
    <c:comp-filter name="VCALENDAR">
      <c:comp-filter name="VEVENT">
        <c:time-range start="{start}" end="{end}"/>
      </c:comp-filter>
    </c:comp-filter>
  </c:filter>
</c:calendar-query>"#
    )
}

/// Pick the event whose UID equals `uid`, else the only one starting with it.
pub fn select_by_uid(candidates: Vec<StoredEvent>, uid: &str) -> Result<StoredEvent> {
    let (exact, prefixed): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .filter(|s| s.event.uid.starts_with(uid))
        .partition(|s| s.event.uid == uid);

    if let Some(found) = exact.into_iter().next() {
        return Ok(found);
    }
    let mut prefixed = prefixed;
    match prefixed.len() {
        0 => Err(ClientError::EventNotFound(uid.to_string())),
        1 => Ok(prefixed.remove(0)),
        _ => Err(ClientError::AmbiguousUid {
            prefix: uid.to_string(),
            matches: prefixed
                .iter()
                .take(MAX_LISTED_MATCHES)
                .map(|s| s.event.uid.clone())
                .collect(),
        }),
    }
}

/// The properties of one `<response>` that the client cares about. Only
/// properties from propstats with a 2xx status are kept.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct DavResponse {
    pub href: String,
    pub displayname: Option<String>,
    pub is_calendar: bool,
    pub principal_href: Option<String>,
    pub home_href: Option<String>,
    pub etag: Option<String>,
    pub calendar_data: Option<String>,
}

impl DavResponse {
    fn merge(&mut self, props: DavResponse) {
        self.displayname = self.displayname.take().or(props.displayname);
        self.is_calendar |= props.is_calendar;
        self.principal_href = self.principal_href.take().or(props.principal_href);
        self.home_href = self.home_href.take().or(props.home_href);
        self.etag = self.etag.take().or(props.etag);
        self.calendar_data = self.calendar_data.take().or(props.calendar_data);
    }
}

/// Parse a `207 Multi-Status` body.
pub fn parse_multistatus(xml: &str) -> Result<Vec<DavResponse>> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut responses = Vec::new();
    let mut stack: Vec<String> = Vec::new();
    let mut current = DavResponse::default();
    let mut props = DavResponse::default();
    let mut status_ok = true;
    let mut text = String::new();

    loop {
        match reader.read_event() {
            Ok(XmlEvent::Start(e)) => {
                let name = local_name(e.local_name().as_ref())?;
                match name.as_str() {
                    "response" => current = DavResponse::default(),
                    "propstat" => {
                        props = DavResponse::default();
                        status_ok = true;
                    }
                    "calendar" if parent_is(&stack, "resourcetype") => props.is_calendar = true,
                    _ => {}
                }
                stack.push(name);
                text.clear();
            }
            Ok(XmlEvent::Empty(e)) => {
                let name = local_name(e.local_name().as_ref())?;
                if name == "calendar" && parent_is(&stack, "resourcetype") {
                    props.is_calendar = true;
                }
            }
            Ok(XmlEvent::Text(e)) => {
                let unescaped = e
                    .unescape()
                    .map_err(|err| ClientError::Response(err.to_string()))?;
                text.push_str(&unescaped);
            }
            Ok(XmlEvent::CData(e)) => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()));
            }
            Ok(XmlEvent::End(_)) => {
                let Some(name) = stack.pop() else { continue };
                let value = std::mem::take(&mut text);
                match name.as_str() {
                    "href" => match stack.last().map(String::as_str) {
                        Some("response") => current.href = value,
                        Some("current-user-principal") => props.principal_href = Some(value),
                        Some("calendar-home-set") => props.home_href = Some(value),
                        _ => {}
                    },
                    "displayname" => props.displayname = Some(value),
                    "getetag" => props.etag = Some(value),
                    "calendar-data" => props.calendar_data = Some(value),
                    "status" if parent_is(&stack, "propstat") => {
                        status_ok = value
                            .split_whitespace()
                            .nth(1)
                            .is_some_and(|code| code.starts_with('2'));
                    }
                    "propstat" if status_ok => current.merge(std::mem::take(&mut props)),
                    "response" => responses.push(std::mem::take(&mut current)),
                    _ => {}
                }
            }
            Ok(XmlEvent::Eof) => break,
            Err(e) => return Err(ClientError::Response(e.to_string())),
            _ => {}
        }
    }

    Ok(responses)
}

fn local_name(bytes: &[u8]) -> Result<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ClientError::Response(e.to_string()))
}

fn parent_is(stack: &[String], name: &str) -> bool {
    stack.last().is_some_and(|parent| parent == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(uid: &str) -> StoredEvent {
        let tz = chrono_tz::UTC;
        let start = tz.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap();
        StoredEvent {
            event: Event {
                uid: uid.to_string(),
                title: "x".to_string(),
                start,
                end: start,
                description: None,
                location: None,
                recurrence: None,
                all_day: false,
            },
            href: Url::parse(&format!("https://dav.example.com/cal/{uid}.ics")).unwrap(),
            etag: None,
        }
    }

    #[test]
    fn test_parse_principal() {
        let xml = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/remote.php/dav/</d:href>
    <d:propstat>
      <d:prop>
        <d:current-user-principal><d:href>/remote.php/dav/principals/users/alice/</d:href></d:current-user-principal>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let responses = parse_multistatus(xml).unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].href, "/remote.php/dav/");
        assert_eq!(
            responses[0].principal_href.as_deref(),
            Some("/remote.php/dav/principals/users/alice/")
        );
    }

    #[test]
    fn test_parse_calendar_listing() {
        let xml = r#"<d:multistatus xmlns:d="DAV:" xmlns:cal="urn:ietf:params:xml:ns:caldav">
  <d:response>
    <d:href>/dav/calendars/alice/</d:href>
    <d:propstat>
      <d:prop><d:resourcetype><d:collection/></d:resourcetype></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
    <d:propstat>
      <d:prop><d:displayname/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/dav/calendars/alice/personal/</d:href>
    <d:propstat>
      <d:prop>
        <d:displayname>Personal</d:displayname>
        <d:resourcetype><d:collection/><cal:calendar/></d:resourcetype>
      </d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let responses = parse_multistatus(xml).unwrap();
        assert_eq!(responses.len(), 2);
        assert!(!responses[0].is_calendar);
        assert_eq!(responses[0].displayname, None);
        assert!(responses[1].is_calendar);
        assert_eq!(responses[1].displayname.as_deref(), Some("Personal"));
    }

    #[test]
    fn test_parse_calendar_data() {
        let xml = "<d:multistatus xmlns:d=\"DAV:\" xmlns:c=\"urn:ietf:params:xml:ns:caldav\">\
  <d:response>\
    <d:href>/cal/abc.ics</d:href>\
    <d:propstat>\
      <d:prop>\
        <d:getetag>\"etag-1\"</d:getetag>\
        <c:calendar-data>BEGIN:VCALENDAR&#13;\nBEGIN:VEVENT&#13;\nUID:abc&#13;\nSUMMARY:Fish &amp; chips&#13;\nDTSTART:20260115T150000Z&#13;\nDTEND:20260115T160000Z&#13;\nEND:VEVENT&#13;\nEND:VCALENDAR&#13;\n</c:calendar-data>\
      </d:prop>\
      <d:status>HTTP/1.1 200 OK</d:status>\
    </d:propstat>\
  </d:response>\
</d:multistatus>";
        let responses = parse_multistatus(xml).unwrap();
        assert_eq!(responses[0].etag.as_deref(), Some("\"etag-1\""));
        let data = responses[0].calendar_data.as_deref().unwrap();
        let event = Event::from_ical(data, chrono_tz::UTC).unwrap();
        assert_eq!(event.uid, "abc");
        assert_eq!(event.title, "Fish & chips");
    }

    #[test]
    fn test_parse_malformed_xml() {
        assert!(parse_multistatus("<d:multistatus xmlns:d=\"DAV:\"><d:response></d:multistatus>").is_err());
    }

    #[test]
    fn test_time_range_query_uses_utc() {
        let from = Utc.with_ymd_and_hms(2026, 1, 15, 5, 0, 0).unwrap();
        let to = Utc.with_ymd_and_hms(2026, 1, 23, 4, 59, 59).unwrap();
        let body = time_range_query(from, to);
        assert!(body.contains(r#"<c:time-range start="20260115T050000Z" end="20260123T045959Z"/>"#));
        assert!(body.contains(r#"<c:expand start="20260115T050000Z""#));
    }

    #[test]
    fn test_select_exact_uid_wins() {
        let found = select_by_uid(vec![stored("abc-123"), stored("abc")], "abc").unwrap();
        assert_eq!(found.event.uid, "abc");
    }

    #[test]
    fn test_select_unique_prefix() {
        let found = select_by_uid(vec![stored("abc-123"), stored("def-456")], "abc").unwrap();
        assert_eq!(found.event.uid, "abc-123");
    }

    #[test]
    fn test_select_ambiguous_prefix() {
        let candidates = (0..7).map(|i| stored(&format!("abc-{i}"))).collect();
        match select_by_uid(candidates, "abc") {
            Err(ClientError::AmbiguousUid { prefix, matches }) => {
                assert_eq!(prefix, "abc");
                assert_eq!(matches.len(), 5);
            }
            other => panic!("expected AmbiguousUid, got {other:?}"),
        }
    }

    #[test]
    fn test_select_missing_uid() {
        let err = select_by_uid(vec![stored("abc")], "xyz").unwrap_err();
        assert_eq!(err.to_string(), "Event with UID 'xyz' not found");
    }
}
