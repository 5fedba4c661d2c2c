use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use clap::{Parser, Subcommand};
use cycle_core::calendar;
use cycle_core::reminders::plan_reminders;
use cycle_core::*;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cycle")]
#[command(about = "Private period tracker with cycle predictions", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// More log output on stderr (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a new period
    Log {
        /// First day (YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS])
        #[arg(long, value_parser = parse_datetime)]
        start: NaiveDateTime,

        /// Last day; leave out while the period is ongoing
        #[arg(long, value_parser = parse_datetime)]
        end: Option<NaiveDateTime>,

        /// Flow level (light, medium, heavy)
        #[arg(long, value_parser = parse_flow, default_value = "medium")]
        flow: FlowLevel,

        /// Symptom tag, repeatable (cramps, headache, back_pain, mood, fatigue, bloating)
        #[arg(long = "symptom", value_parser = parse_symptom)]
        symptoms: Vec<Symptom>,

        /// Free-form notes
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Change a logged period
    Edit {
        /// Record id or a unique prefix of it
        id: String,

        #[arg(long, value_parser = parse_datetime)]
        start: Option<NaiveDateTime>,

        #[arg(long, value_parser = parse_datetime, conflicts_with = "ongoing")]
        end: Option<NaiveDateTime>,

        /// Remove the end date (period still running)
        #[arg(long)]
        ongoing: bool,

        #[arg(long, value_parser = parse_flow)]
        flow: Option<FlowLevel>,

        /// Replace the symptom set with these tags
        #[arg(long = "symptom", value_parser = parse_symptom, conflicts_with = "clear_symptoms")]
        symptoms: Vec<Symptom>,

        /// Remove all symptoms
        #[arg(long)]
        clear_symptoms: bool,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Delete a logged period
    Remove {
        /// Record id or a unique prefix of it
        id: String,
    },

    /// List logged periods, most recent first
    List,

    /// Show the predicted next period and PMS window (default)
    Predict {
        /// Pretend today is this date
        #[arg(long, value_parser = parse_datetime)]
        today: Option<NaiveDateTime>,
    },

    /// Show a month calendar with logged and predicted days
    Calendar {
        /// Month to show (YYYY-MM); defaults to the current month
        #[arg(long, value_parser = parse_month)]
        month: Option<NaiveDate>,

        /// Pretend today is this date
        #[arg(long, value_parser = parse_datetime)]
        today: Option<NaiveDateTime>,
    },

    /// Show the periods covering a day
    Day {
        #[arg(value_parser = parse_datetime)]
        date: NaiveDateTime,
    },

    /// Recompute reminders for the predicted period
    Reminders {
        /// Pretend the current time is this
        #[arg(long, value_parser = parse_datetime)]
        now: Option<NaiveDateTime>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    cycle_core::logging::init_verbose(cli.verbose);

    let mut config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    config.validate()?;
    tracing::debug!("Using data directory {:?}", config.data.data_dir);

    match cli.command {
        Some(Commands::Log {
            start,
            end,
            flow,
            symptoms,
            notes,
        }) => cmd_log(&config, start, end, flow, symptoms, notes),
        Some(Commands::Edit {
            id,
            start,
            end,
            ongoing,
            flow,
            symptoms,
            clear_symptoms,
            notes,
        }) => cmd_edit(
            &config,
            &id,
            RecordChanges {
                start,
                end,
                ongoing,
                flow,
                symptoms,
                clear_symptoms,
                notes,
            },
        ),
        Some(Commands::Remove { id }) => cmd_remove(&config, &id),
        Some(Commands::List) => cmd_list(&config),
        Some(Commands::Predict { today }) => cmd_predict(&config, today.unwrap_or_else(now)),
        Some(Commands::Calendar { month, today }) => {
            let today = today.unwrap_or_else(now);
            cmd_calendar(&config, month.unwrap_or(today.date()), today)
        }
        Some(Commands::Day { date }) => cmd_day(&config, date),
        Some(Commands::Reminders { now: at }) => cmd_reminders(&config, at.unwrap_or_else(now)),
        None => cmd_predict(&config, now()),
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

// ============================================================================
// Argument parsing
// ============================================================================

fn parse_datetime(s: &str) -> std::result::Result<NaiveDateTime, String> {
    let s = s.trim();
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD or YYYY-MM-DDTHH:MM[:SS]", s))
}

fn parse_month(s: &str) -> std::result::Result<NaiveDate, String> {
    NaiveDate::parse_from_str(&format!("{}-01", s.trim()), "%Y-%m-%d")
        .map_err(|_| format!("invalid month '{}': expected YYYY-MM", s))
}

fn parse_flow(s: &str) -> std::result::Result<FlowLevel, String> {
    s.parse::<FlowLevel>().map_err(|e| e.to_string())
}

fn parse_symptom(s: &str) -> std::result::Result<Symptom, String> {
    s.parse::<Symptom>().map_err(|e| e.to_string())
}

// ============================================================================
// Commands
// ============================================================================

fn check_range(start: NaiveDateTime, end: Option<NaiveDateTime>) -> Result<()> {
    match end {
        Some(end) if end < start => Err(Error::InvalidInput(format!(
            "end {} is before start {}",
            end.format("%Y-%m-%d"),
            start.format("%Y-%m-%d")
        ))),
        _ => Ok(()),
    }
}

fn cmd_log(
    config: &Config,
    start: NaiveDateTime,
    end: Option<NaiveDateTime>,
    flow: FlowLevel,
    symptoms: Vec<Symptom>,
    notes: String,
) -> Result<()> {
    check_range(start, end)?;

    let mut record = PeriodRecord::new(start)
        .with_flow(flow)
        .with_symptoms(symptoms)
        .with_notes(notes);
    record.end_date = end;

    let id = PeriodLog::update(&config.history_path(), |log| log.add(record))?;

    println!("✓ Period logged ({})", short_id(&id));
    Ok(())
}

struct RecordChanges {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    ongoing: bool,
    flow: Option<FlowLevel>,
    symptoms: Vec<Symptom>,
    clear_symptoms: bool,
    notes: Option<String>,
}

impl RecordChanges {
    fn apply(self, record: &mut PeriodRecord) {
        if let Some(start) = self.start {
            record.start_date = start;
        }
        if self.ongoing {
            record.end_date = None;
        } else if let Some(end) = self.end {
            record.end_date = Some(end);
        }
        if let Some(flow) = self.flow {
            record.flow = flow;
        }
        if self.clear_symptoms {
            record.symptoms.clear();
        } else if !self.symptoms.is_empty() {
            record.symptoms = self.symptoms.into_iter().collect();
        }
        if let Some(notes) = self.notes {
            record.notes = notes;
        }
    }
}

fn cmd_edit(config: &Config, id_prefix: &str, changes: RecordChanges) -> Result<()> {
    let id = PeriodLog::update(&config.history_path(), |log| {
        let id = log.find_by_prefix(id_prefix)?;
        let record = log
            .get_mut(id)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))?;

        let mut edited = record.clone();
        changes.apply(&mut edited);
        check_range(edited.start_date, edited.end_date)?;
        *record = edited;
        Ok(id)
    })?;

    println!("✓ Period updated ({})", short_id(&id));
    Ok(())
}

fn cmd_remove(config: &Config, id_prefix: &str) -> Result<()> {
    let removed = PeriodLog::update(&config.history_path(), |log| {
        let id = log.find_by_prefix(id_prefix)?;
        log.remove(id)
            .ok_or_else(|| Error::RecordNotFound(id.to_string()))
    })?;

    println!(
        "✓ Removed period starting {} ({})",
        format_day(removed.start_date),
        short_id(&removed.id)
    );
    Ok(())
}

fn cmd_list(config: &Config) -> Result<()> {
    let history = PeriodLog::load(&config.history_path())?.history();

    if history.is_empty() {
        println!("No periods logged yet.");
        return Ok(());
    }

    let now = now();
    for record in &history {
        print_record(record, now);
    }
    Ok(())
}

fn cmd_predict(config: &Config, today: NaiveDateTime) -> Result<()> {
    let history = PeriodLog::load(&config.history_path())?.history();
    let forecast = Forecast::new(&history, &config.forecast);

    let (Some(avg), Some(next)) = (forecast.average_cycle_length(), forecast.next_period()) else {
        println!("Not enough data to predict your next period.");
        println!("Log a period with `cycle log --start YYYY-MM-DD`.");
        return Ok(());
    };

    println!("Average cycle: {} days", avg);
    match forecast.period_window() {
        Some(window) => println!("Next period:   {}", format_window(&window)),
        None => println!("Next period:   {}", format_day(next)),
    }
    if let Some(window) = forecast.pms_window() {
        println!("PMS window:    {}", format_window(&window));
    }

    match forecast.days_until_next_period(today) {
        Some(days) if days > 0 => println!("In {} days", days),
        _ => println!("Today or overdue"),
    }
    Ok(())
}

fn cmd_calendar(config: &Config, month: NaiveDate, today: NaiveDateTime) -> Result<()> {
    let first_weekday = config.calendar.first_weekday;
    let history = PeriodLog::load(&config.history_path())?.history();
    let forecast = Forecast::new(&history, &config.forecast);

    let grid = calendar::pad_to_full_weeks(calendar::build_month_grid(month, first_weekday));

    println!("{}", calendar::month_title(month));
    let headers: String = calendar::weekday_headers(first_weekday)
        .iter()
        .map(|h| format!(" {:<3}", h))
        .collect();
    println!("{}", headers.trim_end());

    for week in grid.chunks(7) {
        let row: String = week
            .iter()
            .map(|cell| match cell {
                Some(date) => format!(
                    " {:>2}{}",
                    date.format("%-d"),
                    mark_symbol(forecast.classify(*date, today))
                ),
                None => "    ".to_string(),
            })
            .collect();
        println!("{}", row.trim_end());
    }

    println!();
    println!("* period   P predicted   s PMS   < today");
    Ok(())
}

fn mark_symbol(mark: DayMark) -> char {
    match mark {
        DayMark::ActualPeriod => '*',
        DayMark::PredictedPeriod => 'P',
        DayMark::PredictedPms => 's',
        DayMark::Today => '<',
        DayMark::Unmarked => ' ',
    }
}

fn cmd_day(config: &Config, date: NaiveDateTime) -> Result<()> {
    let history = PeriodLog::load(&config.history_path())?.history();
    let covering = periods_covering(date, &history);

    println!("{}", date.format("%A, %B %-d, %Y"));
    if covering.is_empty() {
        println!("No period data for this day");
        return Ok(());
    }

    let now = now();
    for record in covering {
        print_record(record, now);
    }
    Ok(())
}

fn cmd_reminders(config: &Config, now: NaiveDateTime) -> Result<()> {
    let history = PeriodLog::load(&config.history_path())?.history();
    let plan = plan_reminders(&history, now, &config.reminders.lead_days);
    tracing::info!(
        "Reminder plan: clearing {}, scheduling {}",
        plan.clear.len(),
        plan.schedule.len()
    );

    let mut sink = JsonReminderSink::open(config.reminders_path())?;
    apply_plan(&mut sink, &plan)?;

    if plan.schedule.is_empty() {
        println!("No reminders scheduled.");
        return Ok(());
    }

    for reminder in &plan.schedule {
        println!(
            "✓ {}  {} ({})",
            reminder.fire_at.format("%b %-d, %Y %H:%M"),
            reminder.title,
            reminder.id
        );
    }
    Ok(())
}

// ============================================================================
// Formatting
// ============================================================================

fn short_id(id: &uuid::Uuid) -> String {
    id.to_string().chars().take(8).collect()
}

fn format_day(date: impl CalendarDay) -> String {
    date.to_day().format("%b %-d, %Y").to_string()
}

fn format_window(window: &DayWindow) -> String {
    format!("{} - {}", format_day(window.first), format_day(window.last))
}

fn print_record(record: &PeriodRecord, now: NaiveDateTime) {
    let end = match record.end_date {
        Some(end) => format_day(end),
        None => "ongoing".to_string(),
    };
    println!(
        "{}  {} → {}  {} days • {}",
        short_id(&record.id),
        format_day(record.start_date),
        end,
        record.duration_days(now),
        record.flow
    );

    if !record.symptoms.is_empty() {
        let symptoms: Vec<&str> = record.symptoms.iter().map(|s| s.label()).collect();
        println!("          Symptoms: {}", symptoms.join(", "));
    }
    if !record.notes.is_empty() {
        println!("          Notes: {}", record.notes);
    }
}
