//! Subcommand handlers.
//!
//! Every handler parses and validates its arguments before connecting, so bad
//! input is reported without touching the network.

use std::path::Path;

use anyhow::{bail, Result};
use chrono::{DateTime, Duration, Timelike, Utc};
use chrono_tz::Tz;
use dialoguer::Confirm;
use justcal_core::validate::{check_range, validate_date_range, validate_non_empty};
use justcal_core::{
    filter_events, resolve_range, translate, CalError, DateParser, Event, NaturalDateParser,
    RangePolicy,
};

use crate::caldav::CalDavClient;
use crate::config::{Config, ConfigError};
use crate::output::{self, Layout};
use crate::{AddArgs, ConfigArgs, DeleteArgs, EditArgs, ListArgs, OutputFormat, SearchArgs};

/// Loaded configuration plus the reference instant for relative dates.
pub struct Context {
    pub config: Config,
    pub tz: Tz,
    pub now: DateTime<Tz>,
}

impl Context {
    pub fn new(config: Config) -> std::result::Result<Self, ConfigError> {
        Self::at(config, Utc::now())
    }

    fn at(config: Config, now: DateTime<Utc>) -> std::result::Result<Self, ConfigError> {
        let tz = config.timezone()?;
        Ok(Self {
            config,
            tz,
            now: now.with_timezone(&tz),
        })
    }

    fn parser(&self) -> NaturalDateParser {
        NaturalDateParser::with_now(self.now)
    }

    fn connect(&self) -> Result<CalDavClient> {
        let password = self.config.password()?;
        Ok(CalDavClient::connect(&self.config.caldav, password, self.tz)?)
    }

    fn display(&self, dt: &DateTime<Tz>) -> String {
        dt.format(&self.config.preferences.date_format).to_string()
    }
}

pub fn add(ctx: &Context, args: AddArgs) -> Result<()> {
    let event = build_event(ctx, &args)?;

    let client = ctx.connect()?;
    client.add_event(&event)?;

    println!("✓ Event created successfully: {}", event.title);
    println!("  UID: {}", event.uid);
    println!("  Start: {}", ctx.display(&event.start));
    println!("  End: {}", ctx.display(&event.end));
    if event.all_day {
        println!("  All-day event: Yes");
    }
    if let Some(rule) = &event.recurrence {
        println!("  Recurrence: {rule}");
    }
    Ok(())
}

fn build_event(ctx: &Context, args: &AddArgs) -> Result<Event> {
    validate_non_empty(&args.title, "Title")?;
    let parser = ctx.parser();

    let start = parse_date(&parser, &args.start, "start date/time")?;
    let midnight = start.hour() == 0 && start.minute() == 0 && start.second() == 0;
    let all_day = args.all_day || midnight;

    let end = match &args.end {
        Some(input) => parse_date(&parser, input, "end date/time")?,
        None if all_day => start,
        None => Duration::try_minutes(ctx.config.preferences.default_duration)
            .and_then(|length| start.checked_add_signed(length))
            .ok_or_else(|| {
                CalError::Validation(format!(
                    "End date out of range: {} plus {} minutes",
                    args.start, ctx.config.preferences.default_duration
                ))
            })?,
    };
    validate_date_range(&start, &end)?;

    let recurrence = args.recur.as_deref().map(parse_recurrence).transpose()?;

    Ok(Event {
        uid: Event::generate_uid(),
        title: args.title.clone(),
        start,
        end,
        description: args.description.clone(),
        location: args.location.clone(),
        recurrence,
        all_day,
    })
}

pub fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let parser = ctx.parser();
    let from = parse_bound(&parser, args.from.as_deref(), "from")?;
    let to = parse_bound(&parser, args.to.as_deref(), "to")?;

    let policy = RangePolicy::list(ctx.config.preferences.list_days);
    let range = resolve_range(from, to, ctx.now, &policy);
    check_range(&range, ctx.config.preferences.strict_ranges)?;

    let client = ctx.connect()?;
    let mut events = client.list_events(range.from, range.to)?;
    if let Some(limit) = args.limit {
        events.truncate(limit);
    }
    print_events(&events, args.format, Layout::When)
}

pub fn search(ctx: &Context, args: SearchArgs) -> Result<()> {
    validate_non_empty(&args.query, "Search query")?;
    let parser = ctx.parser();
    let from = parse_bound(&parser, args.from.as_deref(), "from")?;
    let to = parse_bound(&parser, args.to.as_deref(), "to")?;

    let range = resolve_range(from, to, ctx.now, &RangePolicy::search());
    check_range(&range, ctx.config.preferences.strict_ranges)?;

    let client = ctx.connect()?;
    let events = client.list_events(range.from, range.to)?;
    let matches = filter_events(events, &args.query, args.field);
    tracing::info!(query = %args.query, field = %args.field, count = matches.len(), "search finished");
    print_events(&matches, args.format, Layout::StartEnd)
}

pub fn edit(ctx: &Context, args: EditArgs) -> Result<()> {
    let changes = EventChanges::from_args(&args, &ctx.parser())?;
    if changes.is_empty() {
        println!("No changes specified. Use -t, -s, -e, -d, -l, or -r to update fields.");
        return Ok(());
    }

    let client = ctx.connect()?;
    let stored = client.find_event(&args.uid)?;
    let mut event = stored.event.clone();
    let summary = changes.apply(&mut event, &ctx.config.preferences.date_format);
    validate_date_range(&event.start, &event.end)?;

    client.update_event(&stored, &event)?;

    println!("✓ Event updated successfully: {}", event.title);
    println!("  UID: {}", event.uid);
    println!();
    println!("Changes:");
    for change in summary {
        println!("  - {change}");
    }
    Ok(())
}

pub fn delete(ctx: &Context, args: DeleteArgs) -> Result<()> {
    let client = ctx.connect()?;
    let stored = client.find_event(&args.uid)?;
    let event = &stored.event;

    if !args.yes {
        println!("Delete event: {}", event.title);
        println!("  UID: {}", event.uid);
        println!("  Start: {}", ctx.display(&event.start));
        println!("  End: {}", ctx.display(&event.end));
        if let Some(description) = &event.description {
            println!("  Description: {description}");
        }
        if let Some(location) = &event.location {
            println!("  Location: {location}");
        }
        println!();

        let confirmed = Confirm::new()
            .with_prompt("Are you sure you want to delete this event?")
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    client.delete_event(&stored)?;
    println!("✓ Event deleted successfully: {}", event.title);
    println!("  UID: {}", event.uid);
    Ok(())
}

pub fn config(path: &Path, args: ConfigArgs) -> Result<()> {
    if args.init {
        let config = Config::prompt()?;
        config.save(path)?;
        println!("✓ Configuration saved to {}", path.display());
        return Ok(());
    }

    let mut config = Config::load(path)?;

    if args.show {
        print!("{}", config.show()?);
    } else if args.test {
        let password = config.password()?;
        CalDavClient::connect(&config.caldav, password, config.timezone()?)?;
        println!("Connection successful!");
    } else if let Some(pair) = args.set {
        let [key, value] = pair.as_slice() else {
            bail!("--set expects a KEY and a VALUE");
        };
        config.set(key, value)?;
        config.save(path)?;
        let shown = if key.ends_with("password") { "***" } else { value.as_str() };
        println!("Configuration updated: {key} = {shown}");
    }
    Ok(())
}

/// Field updates for `edit`, parsed up front.
#[derive(Debug, Default)]
struct EventChanges {
    title: Option<String>,
    start: Option<DateTime<Tz>>,
    end: Option<DateTime<Tz>>,
    description: Option<String>,
    location: Option<String>,
    recurrence: Option<String>,
}

impl EventChanges {
    fn from_args(args: &EditArgs, parser: &impl DateParser) -> Result<Self> {
        if let Some(title) = &args.title {
            validate_non_empty(title, "Title")?;
        }
        let parse = |input: &Option<String>, field: &str| {
            input
                .as_deref()
                .map(|s| parse_date(parser, s, field))
                .transpose()
        };

        Ok(Self {
            title: args.title.clone(),
            start: parse(&args.start, "start date/time")?,
            end: parse(&args.end, "end date/time")?,
            description: args.description.clone(),
            location: args.location.clone(),
            recurrence: args.recur.as_deref().map(parse_recurrence).transpose()?,
        })
    }

    fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.description.is_none()
            && self.location.is_none()
            && self.recurrence.is_none()
    }

    /// Apply to `event`, returning a line per changed field.
    fn apply(self, event: &mut Event, date_format: &str) -> Vec<String> {
        let mut summary = Vec::new();
        if let Some(title) = self.title {
            summary.push(format!("title -> {title}"));
            event.title = title;
        }
        if let Some(description) = self.description {
            summary.push(format!("description -> {description}"));
            event.description = Some(description);
        }
        if let Some(location) = self.location {
            summary.push(format!("location -> {location}"));
            event.location = Some(location);
        }
        if let Some(start) = self.start {
            summary.push(format!("start -> {}", start.format(date_format)));
            event.start = start;
        }
        if let Some(end) = self.end {
            summary.push(format!("end -> {}", end.format(date_format)));
            event.end = end;
        }
        if let Some(rule) = self.recurrence {
            summary.push(format!("recurrence -> {rule}"));
            event.recurrence = Some(rule);
        }
        summary
    }
}

fn parse_recurrence(pattern: &str) -> Result<String, CalError> {
    translate(Some(pattern)).ok_or_else(|| CalError::InvalidRecurrence(pattern.to_string()))
}

fn parse_date(
    parser: &impl DateParser,
    input: &str,
    field: &str,
) -> Result<DateTime<Tz>, CalError> {
    parser.parse(input).ok_or_else(|| CalError::InvalidDate {
        field: field.to_string(),
        input: input.to_string(),
    })
}

fn parse_bound(
    parser: &impl DateParser,
    input: Option<&str>,
    which: &str,
) -> Result<Option<DateTime<Tz>>, CalError> {
    input
        .map(|s| parse_date(parser, s, &format!("{which} date")))
        .transpose()
}

fn print_events(events: &[Event], format: OutputFormat, layout: Layout) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", output::render_json(events)?),
        OutputFormat::Table => println!("{}", output::render_table(events, layout)),
    }
    Ok(())
}
