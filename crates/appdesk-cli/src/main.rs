//! `appdesk`: drive the Applications workspace against a live server

use anyhow::{bail, Context};
use appdesk_access::Identity;
use appdesk_core::{
    HttpApplicationsApi, SaveOutcome, Workspace, WorkspaceConfig, WorkspaceError,
};
use appdesk_row::{ApplicationRow, FieldKey, LocalId, ServerId};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

type Desk = Workspace<HttpApplicationsApi>;

fn cli() -> Command {
    Command::new("appdesk")
        .version(appdesk_core::VERSION)
        .about("Applications workspace client")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("TOML configuration file"),
        )
        .arg(
            Arg::new("claims")
                .long("claims")
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("JSON file with the decoded session claims"),
        )
        .arg(
            Arg::new("base-url")
                .long("base-url")
                .global(true)
                .help("Override the API base URL"),
        )
        .arg(
            Arg::new("token")
                .long("token")
                .env("APPDESK_TOKEN")
                .global(true)
                .hide_env_values(true)
                .help("Bearer token"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(Command::new("list").about("List applications"))
        .subcommand(
            Command::new("show")
                .about("Show one application")
                .arg(Arg::new("id").required(true)),
        )
        .subcommand(Command::new("access").about("Show what the session may do"))
        .subcommand(
            Command::new("create")
                .about("Create an application")
                .arg(Arg::new("company").long("company").required(true))
                .arg(Arg::new("role").long("role").required(true))
                .arg(Arg::new("profile").long("profile").required(true))
                .arg(Arg::new("resume").long("resume"))
                .arg(Arg::new("job-url").long("job-url"))
                .arg(Arg::new("note").long("note"))
                .arg(Arg::new("bidder").long("bidder")),
        )
        .subcommand(
            Command::new("update")
                .about("Change fields of an application")
                .arg(Arg::new("id").required(true))
                .arg(
                    Arg::new("set")
                        .long("set")
                        .action(ArgAction::Append)
                        .required(true)
                        .value_name("FIELD=VALUE")
                        .help("Field to change, e.g. --set company=Initech"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Review workflow")
                .subcommand_required(true)
                .subcommand(
                    Command::new("start")
                        .about("Claim a pending application")
                        .arg(Arg::new("id").required(true)),
                )
                .subcommand(
                    Command::new("complete")
                        .about("Record a verdict")
                        .arg(Arg::new("id").required(true))
                        .arg(Arg::new("result").long("result").required(true))
                        .arg(Arg::new("note").long("note")),
                )
                .subcommand(
                    Command::new("cancel")
                        .about("Release a review")
                        .arg(Arg::new("id").required(true)),
                ),
        )
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appdesk=info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

fn load_config(matches: &ArgMatches) -> anyhow::Result<WorkspaceConfig> {
    let mut config = match matches.get_one::<PathBuf>("config") {
        Some(path) => WorkspaceConfig::load(path)?,
        None => WorkspaceConfig::default(),
    };
    if let Some(url) = matches.get_one::<String>("base-url") {
        config = config.with_base_url(url);
    }
    if let Some(token) = matches.get_one::<String>("token") {
        config = config.with_token(token);
    }
    Ok(config)
}

fn load_identity(matches: &ArgMatches) -> anyhow::Result<Identity> {
    let Some(path) = matches.get_one::<PathBuf>("claims") else {
        bail!("--claims is required: pass the decoded session claims as a JSON file");
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read claims {}", path.display()))?;
    let claims: serde_json::Value = serde_json::from_str(&raw).context("claims are not JSON")?;
    Ok(Identity::from_claims(&claims)?)
}

/// Local key of the row with this server id, after a refresh
fn locate(desk: &Desk, id: &str) -> anyhow::Result<LocalId> {
    desk.find(&ServerId::new(id))
        .map(|row| row.local_id)
        .with_context(|| format!("no application {id} visible to this session"))
}

fn print_row(row: &ApplicationRow) {
    let record = &row.record;
    let id = row.server_id.as_ref().map_or("-", ServerId::as_str);
    let checker = record
        .checked_by
        .as_ref()
        .map(|p| p.name.clone().unwrap_or_else(|| p.id.to_string()))
        .unwrap_or_default();
    println!(
        "{:<26} {:<24} {:<28} {:<10} {}",
        id,
        record.company,
        record.role_title,
        record.check_status.label(),
        checker
    );
}

fn print_detail(row: &ApplicationRow) {
    let record = &row.record;
    println!("Id:       {}", row.local_id);
    println!("Company:  {}", record.company);
    println!("Role:     {}", record.role_title);
    println!("Job URL:  {}", record.job_url);
    if let Some(profile) = &record.profile {
        println!("Profile:  {}", profile.display_name());
    }
    if let Some(resume) = &record.resume {
        println!("Resume:   {}", resume.title.as_deref().unwrap_or(resume.id.as_str()));
    }
    if let Some(bidder) = &record.bidder {
        println!("Bidder:   {}", bidder.name.as_deref().unwrap_or(bidder.id.as_str()));
    }
    println!("Status:   {}", record.check_status.label());
    println!("Result:   {}", record.check_result.label());
    if !record.check_note.is_empty() {
        println!("Note:     {}", record.check_note);
    }
    if !record.bidder_note.is_empty() {
        println!("Bidder note: {}", record.bidder_note);
    }
}

fn edit(desk: &Desk, id: &LocalId, field: FieldKey, value: &str) -> Result<(), WorkspaceError> {
    desk.start_editing(id, field)?;
    desk.edit_field(id, field, value)
}

fn report_save(outcome: &SaveOutcome) {
    match outcome {
        SaveOutcome::Created(id) => println!("Created {id}"),
        SaveOutcome::Updated(id) => println!("Updated {id}"),
        SaveOutcome::Unchanged => println!("Nothing to change"),
    }
}

async fn run(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = load_config(matches)?;
    let identity = load_identity(matches)?;
    let api = HttpApplicationsApi::new(&config.api)?;
    tracing::debug!("Using API at {}", api.base_url());
    let desk = Workspace::new(api, identity, config);

    match matches.subcommand() {
        Some(("list", _)) => {
            desk.refresh().await?;
            for row in desk.rows() {
                print_row(&row);
            }
        }
        Some(("show", args)) => {
            let id = args.get_one::<String>("id").context("missing id")?;
            let row = desk.load_detail(&ServerId::new(id.as_str())).await?;
            print_detail(&row);
        }
        Some(("access", _)) => {
            if let Err(e) = desk.refresh().await {
                tracing::warn!("Showing access from session claims only: {}", e);
            }
            let policy = desk.policy();
            println!("view:                  {}", policy.can_view());
            println!("manage:                {}", policy.can_manage());
            println!("check:                 {}", policy.can_check());
            println!("assign other bidders:  {}", policy.can_assign_other_bidders());
            println!("profiles:              {}", policy.grant().profile_access);
        }
        Some(("create", args)) => {
            desk.refresh().await?;
            let draft = desk.begin_draft()?;
            let fields = [
                (FieldKey::Company, "company"),
                (FieldKey::RoleTitle, "role"),
                (FieldKey::ProfileId, "profile"),
                (FieldKey::ResumeId, "resume"),
                (FieldKey::JobUrl, "job-url"),
                (FieldKey::BidderNote, "note"),
                (FieldKey::BidderId, "bidder"),
            ];
            for (field, arg) in fields {
                if let Some(value) = args.get_one::<String>(arg) {
                    edit(&desk, &draft, field, value)?;
                }
            }
            report_save(&desk.save(&draft).await?);
        }
        Some(("update", args)) => {
            desk.refresh().await?;
            let id = locate(&desk, args.get_one::<String>("id").context("missing id")?)?;
            desk.begin_edit_mode(&id)?;
            for assignment in args.get_many::<String>("set").into_iter().flatten() {
                let (key, value) = assignment
                    .split_once('=')
                    .with_context(|| format!("expected FIELD=VALUE, got {assignment}"))?;
                edit(&desk, &id, key.parse()?, value)?;
            }
            report_save(&desk.save(&id).await?);
        }
        Some(("check", check)) => {
            desk.refresh().await?;
            let (action, args) = check.subcommand().context("missing check action")?;
            let id = locate(&desk, args.get_one::<String>("id").context("missing id")?)?;
            let row = match action {
                "start" => desk.start_check(&id).await?,
                "complete" => {
                    if let Some(result) = args.get_one::<String>("result") {
                        desk.stage_review(&id, FieldKey::CheckResult, result)?;
                    }
                    if let Some(note) = args.get_one::<String>("note") {
                        desk.stage_review(&id, FieldKey::CheckNote, note)?;
                    }
                    desk.complete_check(&id).await?
                }
                "cancel" => desk.cancel_check(&id).await?,
                other => bail!("unknown check action {other}"),
            };
            print_detail(&row);
        }
        _ => bail!("no command given"),
    }

    desk.close();
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));
    run(&matches).await
}
