//! One-shot subcommands. Everything here goes through the same context and
//! data functions as the terminal UI.

use chrono::{Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use crossterm::event::{self, Event as CrosstermEvent, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::auth::RegisterOutcome;
use crate::backend::AuthUser;
use crate::context::AppContext;
use crate::data::{
  activities, metrics, parse_local_datetime, plans, profile, signups, workouts, DateRange,
};
use crate::export;
use crate::load::{cached_profile, LoadState};
use crate::models::{
  ActivityCategory, ActivityDraft, Intensity, MetricDraft, MetricType, PlanDraft, PlannedExercise,
  Profile, ProfilePatch, SignupStatus, WorkoutDraft,
};
use crate::reminders::TerminalNotifier;
use crate::stats;
use crate::theme::Theme;
use crate::ui::components::{InputResult, TextInput};
use crate::ui::renderfns::{local_time, opt_value};

#[derive(Parser, Debug)]
#[command(name = "vitals")]
#[command(about = "Track workouts, mood, sleep and wellness activities from the terminal")]
#[command(version)]
pub struct Cli {
  /// Path to config file (default: ./vitals.yaml, then $XDG_CONFIG_HOME/vitals/config.yaml)
  #[arg(short, long, global = true)]
  pub config: Option<PathBuf>,

  #[command(subcommand)]
  pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
  /// Open the terminal UI (default)
  Ui {
    /// Page to open, e.g. /workouts
    #[arg(default_value = "/dashboard")]
    path: String,
  },
  /// Sign in with email and password (reads VITALS_PASSWORD if set)
  Login { email: String },
  /// Create an account
  Signup {
    email: String,
    #[arg(long)]
    name: Option<String>,
  },
  /// Sign out and forget the saved session
  Logout,
  /// Show the signed-in user
  Whoami,
  /// Sign in through an OAuth provider
  #[command(subcommand)]
  Oauth(OauthCommand),
  /// Show or edit your profile
  Profile(ProfileArgs),
  /// Workout log
  #[command(subcommand)]
  Workout(WorkoutCommand),
  /// Workout plans
  #[command(subcommand)]
  Plan(PlanCommand),
  /// Record a mood score (1-10), or show the last two weeks
  Mood(QuickMetric),
  /// Record hours slept, or show recent nights
  Sleep(QuickMetric),
  /// Any tracked measurement
  #[command(subcommand)]
  Metric(MetricCommand),
  /// Scheduled wellness activities
  #[command(subcommand)]
  Activity(ActivityCommand),
  /// This week at a glance
  Summary,
  /// Poll for due reminders and ring the terminal
  Reminders {
    /// Check once and exit
    #[arg(long)]
    once: bool,
  },
  /// Write all your data to a JSON file
  Export { path: PathBuf },
  /// Load data from an export file
  Import { path: PathBuf },
  /// Review pending signups (admin only)
  #[command(subcommand)]
  Admin(AdminCommand),
  /// Show or set the UI theme
  Theme {
    /// light, dark or system
    value: Option<String>,
  },
}

#[derive(Subcommand, Debug)]
pub enum OauthCommand {
  /// Print the URL to open in a browser
  Url {
    provider: String,
    #[arg(long)]
    redirect_to: Option<String>,
  },
  /// Finish sign-in with the URL the browser was redirected to
  Complete { redirect_url: String },
}

#[derive(Args, Debug, Default)]
pub struct ProfileArgs {
  #[arg(long)]
  name: Option<String>,
  /// Date of birth, YYYY-MM-DD
  #[arg(long)]
  dob: Option<NaiveDate>,
  #[arg(long)]
  height: Option<f64>,
  #[arg(long)]
  weight: Option<f64>,
  #[arg(long)]
  goal: Option<String>,
  /// Upload an image as the profile picture
  #[arg(long)]
  avatar: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum WorkoutCommand {
  List {
    #[arg(long, default_value_t = 30)]
    days: u32,
  },
  Add {
    /// e.g. Run, Cycling, Strength
    workout_type: String,
    minutes: u32,
    #[arg(long)]
    calories: Option<u32>,
    #[arg(long, default_value = "moderate")]
    intensity: Intensity,
    /// When it happened (default: now)
    #[arg(long)]
    at: Option<String>,
    #[arg(long)]
    notes: Option<String>,
  },
  Edit {
    id: Uuid,
    #[arg(long)]
    workout_type: Option<String>,
    #[arg(long)]
    minutes: Option<u32>,
    #[arg(long)]
    calories: Option<u32>,
    #[arg(long)]
    intensity: Option<Intensity>,
    #[arg(long)]
    notes: Option<String>,
  },
  Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum PlanCommand {
  List,
  Add {
    name: String,
    #[arg(long, default_value_t = 3)]
    days: u8,
    /// Name:SETSxREPS[@REST], repeatable
    #[arg(long = "exercise", required = true)]
    exercises: Vec<PlannedExercise>,
    #[arg(long)]
    description: Option<String>,
  },
  Activate { id: Uuid },
  Deactivate { id: Uuid },
  Delete { id: Uuid },
}

#[derive(Args, Debug)]
pub struct QuickMetric {
  value: Option<f64>,
  #[arg(long)]
  notes: Option<String>,
  #[arg(long)]
  at: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum MetricCommand {
  List {
    #[arg(long = "type")]
    metric_type: Option<MetricType>,
    #[arg(long, default_value_t = 14)]
    days: u32,
  },
  Add {
    metric_type: MetricType,
    value: f64,
    #[arg(long)]
    notes: Option<String>,
    #[arg(long)]
    at: Option<String>,
  },
  Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum ActivityCommand {
  List {
    #[arg(long, default_value_t = 14)]
    days: i64,
  },
  Add {
    title: String,
    /// YYYY-MM-DD HH:MM, or HH:MM for today
    at: String,
    #[arg(long, default_value = "other")]
    category: ActivityCategory,
    #[arg(long)]
    minutes: Option<u32>,
    /// Minutes before the start to send a reminder
    #[arg(long)]
    remind: Option<i64>,
    #[arg(long)]
    notes: Option<String>,
  },
  Done { id: Uuid },
  Undo { id: Uuid },
  Delete { id: Uuid },
}

#[derive(Subcommand, Debug)]
pub enum AdminCommand {
  /// List signups waiting for review
  Pending,
  Approve { id: Uuid },
  Reject { id: Uuid },
}

pub async fn run(ctx: Arc<AppContext>, command: Command) -> Result<()> {
  match command {
    Command::Ui { .. } => Err(eyre!("The terminal UI is started from main")),
    Command::Login { email } => {
      let password = read_password("Password: ")?;
      let user = ctx.auth.login(&email, &password).await?;
      println!("Signed in as {}", user.email);
      Ok(())
    }
    Command::Signup { email, name } => signup(&ctx, &email, name.as_deref()).await,
    Command::Logout => {
      ctx.auth.restore().await;
      ctx.auth.logout().await;
      println!("Signed out");
      Ok(())
    }
    Command::Whoami => {
      let user = signed_in(&ctx).await?;
      let name = user.full_name.as_deref().unwrap_or("-");
      println!("{} ({}), role {}, id {}", user.email, name, user.role, user.id);
      Ok(())
    }
    Command::Oauth(cmd) => oauth(&ctx, cmd).await,
    Command::Profile(args) => profile_cmd(&ctx, args).await,
    Command::Workout(cmd) => workout(&ctx, cmd).await,
    Command::Plan(cmd) => plan(&ctx, cmd).await,
    Command::Mood(args) => quick_metric(&ctx, MetricType::Mood, args).await,
    Command::Sleep(args) => quick_metric(&ctx, MetricType::Sleep, args).await,
    Command::Metric(cmd) => metric(&ctx, cmd).await,
    Command::Activity(cmd) => activity(&ctx, cmd).await,
    Command::Summary => summary(&ctx).await,
    Command::Reminders { once } => reminders(&ctx, once).await,
    Command::Export { path } => export_cmd(&ctx, &path).await,
    Command::Import { path } => import_cmd(&ctx, &path).await,
    Command::Admin(cmd) => admin(&ctx, cmd).await,
    Command::Theme { value } => theme(&ctx, value.as_deref()),
  }
}

/// Restore the saved session or fail with a hint to log in.
async fn signed_in(ctx: &AppContext) -> Result<AuthUser> {
  ctx
    .auth
    .restore()
    .await
    .ok_or_else(|| eyre!("Not signed in. Run `vitals login <email>` first."))
}

/// VITALS_PASSWORD, or a masked prompt on the terminal.
fn read_password(prompt: &str) -> Result<String> {
  if let Ok(password) = std::env::var("VITALS_PASSWORD") {
    return Ok(password);
  }
  let mut err = std::io::stderr();
  write!(err, "{}", prompt)?;
  err.flush()?;

  enable_raw_mode()?;
  let mut input = TextInput::masked();
  let result = loop {
    match event::read() {
      Ok(CrosstermEvent::Key(key)) if key.kind == KeyEventKind::Press => {
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
          break Err(eyre!("Cancelled"));
        }
        match input.handle_key(key) {
          InputResult::Submitted(value) => break Ok(value),
          InputResult::Cancelled => break Err(eyre!("Cancelled")),
          _ => {}
        }
      }
      Ok(_) => {}
      Err(e) => break Err(eyre!("Failed to read password: {}", e)),
    }
  };
  disable_raw_mode()?;
  writeln!(err)?;
  result
}

fn at_or_now(at: Option<&str>) -> Result<chrono::DateTime<Utc>> {
  match at {
    Some(raw) => Ok(parse_local_datetime(raw)?),
    None => Ok(Utc::now()),
  }
}

async fn signup(ctx: &AppContext, email: &str, name: Option<&str>) -> Result<()> {
  let password = read_password("Choose a password: ")?;
  match ctx.auth.register(ctx.remote.as_ref(), email, &password, name).await? {
    RegisterOutcome::SignedIn(user) => println!("Welcome, {}! You are signed in.", user.email),
    RegisterOutcome::PendingConfirmation { email } => println!(
      "Account created for {}. Confirm your email (or wait for approval), then run `vitals login {}`.",
      email, email
    ),
  }
  Ok(())
}

async fn oauth(ctx: &AppContext, cmd: OauthCommand) -> Result<()> {
  match cmd {
    OauthCommand::Url {
      provider,
      redirect_to,
    } => {
      let url = ctx.auth.oauth_url(&provider, redirect_to.as_deref())?;
      println!("Open this URL to continue:\n{}", url);
    }
    OauthCommand::Complete { redirect_url } => {
      let user = ctx.auth.complete_oauth(&redirect_url).await?;
      println!("Signed in as {}", user.email);
    }
  }
  Ok(())
}

async fn profile_cmd(ctx: &AppContext, args: ProfileArgs) -> Result<()> {
  let user = signed_in(ctx).await?;
  let loader = ctx.profile_loader()?;
  let current = match loader.load().await {
    LoadState::Loaded(profile) => profile,
    LoadState::Failed { error, .. } => match cached_profile(ctx.store.as_ref(), &user.id) {
      Some(cached) => {
        eprintln!("Could not reach the backend ({}); showing the saved copy.", error);
        print_profile(&cached);
        return Ok(());
      }
      None => return Err(error.into()),
    },
    LoadState::Idle | LoadState::Loading { .. } => None,
  };

  if let Some(path) = &args.avatar {
    let bytes = std::fs::read(path).map_err(|e| eyre!("Cannot read {}: {}", path.display(), e))?;
    let file_name = path
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| "avatar".to_string());
    let saved = profile::upload_avatar(
      ctx.remote.as_ref(),
      ctx.files.as_ref(),
      &ctx.config.backend.avatar_bucket,
      &user.id,
      &file_name,
      bytes,
    )
    .await
    .into_result()?;
    println!("Profile picture updated: {}", saved.avatar_url.unwrap_or_default());
  }

  let patch = ProfilePatch {
    full_name: args.name,
    date_of_birth: args.dob,
    height_cm: args.height,
    weight_kg: args.weight,
    fitness_goal: args.goal,
    avatar_url: None,
  };
  if patch.is_empty() {
    match current {
      Some(p) => print_profile(&p),
      None if args.avatar.is_none() => {
        println!("No profile yet. Create one with `vitals profile --name <name>`.")
      }
      None => {}
    }
    return Ok(());
  }

  patch.validate()?;
  let saved = match current {
    Some(_) => profile::update_profile(ctx.remote.as_ref(), &user.id, &patch).await,
    None => {
      let mut fresh = Profile::empty(&user.id, &user.email);
      fresh.full_name = user.full_name.clone();
      fresh.apply(&patch);
      profile::upsert_profile(ctx.remote.as_ref(), &user.id, &fresh).await
    }
  }
  .into_result()?;
  print_profile(&saved);
  Ok(())
}

fn print_profile(p: &Profile) {
  println!("Name:          {}", p.full_name.as_deref().unwrap_or("-"));
  println!("Email:         {}", p.email);
  println!(
    "Date of birth: {}",
    p.date_of_birth.map(|d| d.to_string()).unwrap_or_else(|| "-".into())
  );
  println!("Height:        {}", opt_value(p.height_cm, "cm"));
  println!("Weight:        {}", opt_value(p.weight_kg, "kg"));
  println!("BMI:           {}", opt_value(p.bmi(), ""));
  println!("Goal:          {}", p.fitness_goal.as_deref().unwrap_or("-"));
}

async fn workout(ctx: &AppContext, cmd: WorkoutCommand) -> Result<()> {
  let user = signed_in(ctx).await?;
  let remote = ctx.remote.as_ref();
  match cmd {
    WorkoutCommand::List { days } => {
      let range = DateRange::last_days(days, Utc::now().date_naive());
      let rows = workouts::list_workouts(remote, &user.id, Some(range))
        .await
        .into_result()?;
      for w in &rows {
        println!(
          "{}  {:<18} {:<16} {:>4} min  {:<8} {}",
          w.id,
          local_time(w.performed_at),
          w.workout_type,
          w.duration_minutes,
          w.intensity.to_string(),
          w.calories_burned.map(|c| format!("{} kcal", c)).unwrap_or_default()
        );
      }
      for t in stats::workout_type_breakdown(&rows) {
        println!("  {:<16} {} sessions, {} min", t.workout_type, t.sessions, t.minutes);
      }
      if rows.is_empty() {
        println!("No workouts in the last {} days.", days);
      }
    }
    WorkoutCommand::Add {
      workout_type,
      minutes,
      calories,
      intensity,
      at,
      notes,
    } => {
      let draft = WorkoutDraft {
        workout_type,
        duration_minutes: minutes,
        calories_burned: calories,
        intensity,
        notes,
        performed_at: at_or_now(at.as_deref())?,
      };
      draft.validate()?;
      let w = workouts::create_workout(remote, &user.id, draft)
        .await
        .into_result()?;
      println!("Logged {} ({} min) as {}", w.workout_type, w.duration_minutes, w.id);
    }
    WorkoutCommand::Edit {
      id,
      workout_type,
      minutes,
      calories,
      intensity,
      notes,
    } => {
      let range = DateRange::last_days(365, Utc::now().date_naive());
      let mut w = workouts::list_workouts(remote, &user.id, Some(range))
        .await
        .into_result()?
        .into_iter()
        .find(|w| w.id == id)
        .ok_or_else(|| eyre!("Workout {} not found in the last year", id))?;
      if let Some(v) = workout_type {
        w.workout_type = v;
      }
      if let Some(v) = minutes {
        w.duration_minutes = v;
      }
      if calories.is_some() {
        w.calories_burned = calories;
      }
      if let Some(v) = intensity {
        w.intensity = v;
      }
      if notes.is_some() {
        w.notes = notes;
      }
      let w = workouts::update_workout(remote, &user.id, &w)
        .await
        .into_result()?;
      println!("Updated {} ({} min)", w.workout_type, w.duration_minutes);
    }
    WorkoutCommand::Delete { id } => {
      workouts::delete_workout(remote, &user.id, id)
        .await
        .into_result()?;
      println!("Deleted workout {}", id);
    }
  }
  Ok(())
}

async fn plan(ctx: &AppContext, cmd: PlanCommand) -> Result<()> {
  let user = signed_in(ctx).await?;
  let remote = ctx.remote.as_ref();
  match cmd {
    PlanCommand::List => {
      let rows = plans::list_plans(remote, &user.id).await.into_result()?;
      if rows.is_empty() {
        println!("No plans yet.");
      }
      for p in rows {
        let marker = if p.is_active { "*" } else { " " };
        println!("{} {}  {} ({}x/week)", marker, p.id, p.name, p.days_per_week);
        for ex in p.exercises {
          println!("      {} {}x{} rest {}s", ex.name, ex.sets, ex.reps, ex.rest_seconds);
        }
      }
    }
    PlanCommand::Add {
      name,
      days,
      exercises,
      description,
    } => {
      let draft = PlanDraft {
        name,
        description,
        days_per_week: days,
        exercises,
      };
      draft.validate()?;
      let p = plans::create_plan(remote, &user.id, draft).await.into_result()?;
      println!("Created plan {} ({})", p.name, p.id);
    }
    PlanCommand::Activate { id } => set_active(ctx, &user, id, true).await?,
    PlanCommand::Deactivate { id } => set_active(ctx, &user, id, false).await?,
    PlanCommand::Delete { id } => {
      plans::delete_plan(remote, &user.id, id).await.into_result()?;
      println!("Deleted plan {}", id);
    }
  }
  Ok(())
}

async fn set_active(ctx: &AppContext, user: &AuthUser, id: Uuid, active: bool) -> Result<()> {
  let p = plans::set_active_plan(ctx.remote.as_ref(), &user.id, id, active)
    .await
    .into_result()?;
  println!("{} is now {}", p.name, if p.is_active { "active" } else { "inactive" });
  Ok(())
}

async fn record(
  ctx: &AppContext,
  user: &AuthUser,
  metric_type: MetricType,
  value: f64,
  notes: Option<String>,
  at: Option<&str>,
) -> Result<()> {
  let draft = MetricDraft {
    metric_type,
    value,
    notes,
    recorded_at: at_or_now(at)?,
  };
  draft.validate()?;
  let m = metrics::record_metric(ctx.remote.as_ref(), &user.id, draft)
    .await
    .into_result()?;
  println!("Recorded {} {} {}", m.metric_type, m.value, m.unit);
  Ok(())
}

async fn quick_metric(ctx: &AppContext, metric_type: MetricType, args: QuickMetric) -> Result<()> {
  let user = signed_in(ctx).await?;
  if let Some(value) = args.value {
    return record(ctx, &user, metric_type, value, args.notes, args.at.as_deref()).await;
  }

  let range = DateRange::last_days(14, Utc::now().date_naive());
  let rows = metrics::list_metrics(ctx.remote.as_ref(), &user.id, Some(metric_type), Some(range))
    .await
    .into_result()?;
  match metric_type {
    MetricType::Sleep => match stats::sleep_summary(&rows) {
      Some(s) => println!(
        "{} nights: average {:.1}h (shortest {:.1}h, longest {:.1}h)",
        s.nights, s.average, s.min, s.max
      ),
      None => println!("No sleep recorded in the last 14 days."),
    },
    _ => {
      for day in stats::mood_trend(&rows, range) {
        let bar = day
          .value
          .map(|v| "#".repeat(v.round().max(0.0) as usize))
          .unwrap_or_default();
        println!("{}  {:>5}  {}", day.date.format("%a %d %b"), opt_value(day.value, ""), bar);
      }
    }
  }
  Ok(())
}

async fn metric(ctx: &AppContext, cmd: MetricCommand) -> Result<()> {
  let user = signed_in(ctx).await?;
  match cmd {
    MetricCommand::List { metric_type, days } => {
      let range = DateRange::last_days(days, Utc::now().date_naive());
      let rows = metrics::list_metrics(ctx.remote.as_ref(), &user.id, metric_type, Some(range))
        .await
        .into_result()?;
      for m in &rows {
        println!(
          "{}  {:<18} {:<10} {:>8} {:<6} {}",
          m.id,
          local_time(m.recorded_at),
          m.metric_type.as_str(),
          m.value,
          m.unit,
          m.notes.as_deref().unwrap_or("")
        );
      }
      for t in MetricType::ALL {
        if let Some(latest) = stats::latest(&rows, t) {
          println!("  latest {:<10} {} {}", t.as_str(), latest.value, latest.unit);
        }
      }
    }
    MetricCommand::Add {
      metric_type,
      value,
      notes,
      at,
    } => record(ctx, &user, metric_type, value, notes, at.as_deref()).await?,
    MetricCommand::Delete { id } => {
      metrics::delete_metric(ctx.remote.as_ref(), &user.id, id)
        .await
        .into_result()?;
      println!("Deleted entry {}", id);
    }
  }
  Ok(())
}

async fn activity(ctx: &AppContext, cmd: ActivityCommand) -> Result<()> {
  let user = signed_in(ctx).await?;
  let remote = ctx.remote.as_ref();
  match cmd {
    ActivityCommand::List { days } => {
      let today = Utc::now().date_naive();
      let range = DateRange::new(today, today + Duration::days(days));
      let rows = activities::list_activities(remote, &user.id, Some(range))
        .await
        .into_result()?;
      if rows.is_empty() {
        println!("Nothing scheduled in the next {} days.", days);
      }
      for a in rows {
        let done = if a.completed { "x" } else { " " };
        let reminder = a
          .reminder_time
          .map(|t| format!("remind {}", local_time(t)))
          .unwrap_or_default();
        println!(
          "[{}] {}  {:<18} {:<24} {:<11} {}",
          done,
          a.id,
          local_time(a.scheduled_at),
          a.title,
          a.category.to_string(),
          reminder
        );
      }
    }
    ActivityCommand::Add {
      title,
      at,
      category,
      minutes,
      remind,
      notes,
    } => {
      let draft = ActivityDraft {
        title,
        category,
        scheduled_at: parse_local_datetime(&at)?,
        duration_minutes: minutes,
        remind_before: remind,
        notes,
      };
      draft.validate()?;
      let a = activities::create_activity(remote, &user.id, draft)
        .await
        .into_result()?;
      println!("Scheduled {} for {} ({})", a.title, local_time(a.scheduled_at), a.id);
    }
    ActivityCommand::Done { id } => set_completed(ctx, &user, id, true).await?,
    ActivityCommand::Undo { id } => set_completed(ctx, &user, id, false).await?,
    ActivityCommand::Delete { id } => {
      activities::delete_activity(remote, &user.id, id)
        .await
        .into_result()?;
      println!("Deleted activity {}", id);
    }
  }
  Ok(())
}

async fn set_completed(ctx: &AppContext, user: &AuthUser, id: Uuid, completed: bool) -> Result<()> {
  let a = activities::complete_activity(ctx.remote.as_ref(), &user.id, id, completed)
    .await
    .into_result()?;
  println!("{} {}", if a.completed { "Completed" } else { "Reopened" }, a.title);
  Ok(())
}

async fn summary(ctx: &AppContext) -> Result<()> {
  signed_in(ctx).await?;
  let s = ctx.dashboard(Utc::now()).await?;
  println!(
    "This week: {} workouts, {} min, {} kcal",
    s.workouts_this_week, s.minutes_this_week, s.calories_this_week
  );
  println!("Streak:    {} days", s.streak_days);
  println!("Mood:      {}", opt_value(s.average_mood, "/ 10"));
  println!("Sleep:     {}", opt_value(s.average_sleep, "h"));
  println!("Weight:    {}", opt_value(s.latest_weight, "kg"));
  println!("Upcoming:  {} activities", s.upcoming_activities);
  for day in &s.week {
    println!(
      "  {}  {:>3} min  {}",
      day.date.format("%a"),
      day.minutes,
      "#".repeat((day.minutes / 10) as usize)
    );
  }
  Ok(())
}

async fn reminders(ctx: &AppContext, once: bool) -> Result<()> {
  signed_in(ctx).await?;
  let notifier = Arc::new(TerminalNotifier::new(ctx.config.reminders.notifications));
  let poller = ctx.reminder_poller(notifier)?;
  if once {
    let report = poller.tick(Utc::now()).await;
    println!(
      "{} due, {} notified, {} marked sent",
      report.due, report.notified, report.marked
    );
    return Ok(());
  }
  println!(
    "Watching for reminders every {}s. Press Ctrl-C to stop.",
    ctx.config.reminders.interval_secs
  );
  let handle = poller.spawn();
  tokio::signal::ctrl_c().await?;
  handle.stop().await;
  Ok(())
}

async fn export_cmd(ctx: &AppContext, path: &Path) -> Result<()> {
  let user = signed_in(ctx).await?;
  let bundle = export::export_user(ctx.remote.as_ref(), &user.id).await?;
  export::write_file(path, &bundle)?;
  for (table, info) in &bundle.manifest.tables {
    println!("  {:<18} {} rows", table, info.count);
  }
  println!("Exported to {}", path.display());
  Ok(())
}

async fn import_cmd(ctx: &AppContext, path: &Path) -> Result<()> {
  let user = signed_in(ctx).await?;
  let bundle = export::read_file(path)?;
  let report = export::import_user(ctx.remote.as_ref(), &user, bundle).await?;
  println!(
    "Imported {} workouts, {} plans, {} entries, {} activities{}",
    report.workouts,
    report.plans,
    report.metrics,
    report.activities,
    if report.profile { " and your profile" } else { "" }
  );
  Ok(())
}

async fn admin(ctx: &AppContext, cmd: AdminCommand) -> Result<()> {
  let user = signed_in(ctx).await?;
  if !user.is_admin() {
    return Err(eyre!("Admin access required"));
  }
  let remote = ctx.remote.as_ref();
  let (id, decision) = match cmd {
    AdminCommand::Pending => {
      let rows = signups::list_pending_signups(remote).await.into_result()?;
      if rows.is_empty() {
        println!("No signups waiting for review.");
      }
      for s in rows {
        println!(
          "{}  {:<18} {:<32} {}",
          s.id,
          local_time(s.requested_at),
          s.email,
          s.full_name.as_deref().unwrap_or("-")
        );
      }
      return Ok(());
    }
    AdminCommand::Approve { id } => (id, SignupStatus::Approved),
    AdminCommand::Reject { id } => (id, SignupStatus::Rejected),
  };
  let reviewed = signups::review_signup(remote, &user.id, id, decision)
    .await
    .into_result()?;
  println!("{} {}", reviewed.status, reviewed.email);
  Ok(())
}

fn theme(ctx: &AppContext, value: Option<&str>) -> Result<()> {
  match value {
    None => println!("{}", Theme::load(ctx.store.as_ref())),
    Some(raw) => {
      let theme: Theme = raw.parse()?;
      theme.save(ctx.store.as_ref())?;
      println!("Theme set to {}", theme);
    }
  }
  Ok(())
}
