//! `s3repo` — a thin `clap` command-line shell over the repository façade.
//!
//! Library crates (`s3repo-core`, `s3repo-store`) never install a global
//! `tracing` subscriber, only this binary does, and `anyhow::Result` is used
//! at this outermost boundary while the libraries stay on typed `thiserror`
//! errors.

use std::sync::Arc;

use anyhow::{anyhow, Context as _, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_BORDERS_ONLY, Table};

use s3repo_core::entities::file;
use s3repo_core::lifecycle::AddFileOptions;
use s3repo_core::query::TagPredicate;
use s3repo_core::tags::DateGranularity;
use s3repo_core::{entity_ops, lifecycle, maintenance, query, tags, RepoConfig, RepoContext};
use s3repo_store::{OpendalObjectStore, S3Credentials};

#[derive(Parser, Debug)]
#[command(name = "s3repo", about = "Content repository metadata-and-lifecycle CLI")]
struct Cli {
	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// Create the repository schema. Fails if it already exists.
	CreateRepository,

	/// Register a new immutable artifact at a logical path.
	AddFile {
		/// Logical, client-visible path.
		path: String,
		/// Bucket to create the file in (defaults to `s3.default_bucket`).
		#[arg(long)]
		bucket: Option<String>,
		/// Object-store key (defaults to `{path}/{epoch_seconds}`).
		#[arg(long)]
		object_key: Option<String>,
	},

	/// Look up the current (published, non-expired) version at a path.
	GetFile { path: String },

	/// Compute digest/size and PUT a file's local bytes (idempotent).
	Upload { file_id: i32 },

	/// Make a file the current version of its path.
	Publish { file_id: i32 },

	/// Remove a file from the current view, retaining its row.
	Expire { file_id: i32 },

	/// Delete a non-published file's row and bytes.
	Purge { file_id: i32 },

	/// Fetch a file's bytes locally if absent, verifying the digest.
	Download { file_id: i32 },

	/// Remove a file's local bytes only.
	Unlink { file_id: i32 },

	/// Ensure an empty local file exists, for out-of-band writers.
	Touch { file_id: i32 },

	/// Attach one or more tags to a specific file version.
	TagFile { file_id: i32, tags: Vec<String> },

	/// Attach one or more tags to every version at a path.
	TagPath { path_id: i32, tags: Vec<String> },

	/// Attach the canonical date tags for a timestamp at a given granularity.
	TagDate {
		path_id: i32,
		/// RFC 3339 timestamp, e.g. `2013-04-24T01:02:03Z`.
		at: DateTime<Utc>,
		#[arg(value_enum)]
		granularity: GranularityArg,
	},

	/// Search for files by tag predicate.
	FindTagged {
		#[arg(long, value_delimiter = ',')]
		any: Vec<String>,
		#[arg(long, value_delimiter = ',')]
		all: Vec<String>,
		#[arg(long, value_delimiter = ',')]
		exclude: Vec<String>,
		/// Restrict to currently-published files (default true).
		#[arg(long, default_value_t = true)]
		published: bool,
	},

	/// Dump and publish a backup of the metadata schema.
	Backup,

	/// Restore the metadata schema from the newest backup.
	Restore,

	/// Run the per-host cache pruning loop.
	MaintainHost,

	/// Run the cluster-wide expire/delete sweep.
	MaintainDb,
}

#[derive(Copy, Clone, Debug, clap::ValueEnum)]
enum GranularityArg {
	Hour,
	Day,
	Week,
	Month,
}

impl From<GranularityArg> for DateGranularity {
	fn from(value: GranularityArg) -> Self {
		match value {
			GranularityArg::Hour => DateGranularity::Hour,
			GranularityArg::Day => DateGranularity::Day,
			GranularityArg::Week => DateGranularity::Week,
			GranularityArg::Month => DateGranularity::Month,
		}
	}
}

async fn find_file(ctx: &RepoContext, file_id: i32) -> Result<file::Model> {
	entity_ops::find_by_id::<file::Entity, _>(&ctx.db(), file_id)
		.await?
		.ok_or_else(|| anyhow!("no file with id {file_id}"))
}

fn print_file(model: &file::Model) {
	let mut table = Table::new();
	table.load_preset(UTF8_BORDERS_ONLY);
	table.set_header(vec!["field", "value"]);
	table.add_row(vec!["file_id".to_owned(), model.file_id.to_string()]);
	table.add_row(vec!["bucket_id".to_owned(), model.bucket_id.to_string()]);
	table.add_row(vec!["object_key".to_owned(), model.object_key.clone()]);
	table.add_row(vec!["path_id".to_owned(), model.path_id.to_string()]);
	table.add_row(vec!["guid".to_owned(), model.guid.to_string()]);
	table.add_row(vec!["published".to_owned(), model.published.to_string()]);
	table.add_row(vec![
		"date_uploaded".to_owned(),
		model.date_uploaded.map(|d| d.to_rfc3339()).unwrap_or_default(),
	]);
	table.add_row(vec![
		"date_published".to_owned(),
		model.date_published.map(|d| d.to_rfc3339()).unwrap_or_default(),
	]);
	table.add_row(vec![
		"date_expired".to_owned(),
		model.date_expired.map(|d| d.to_rfc3339()).unwrap_or_default(),
	]);
	println!("{table}");
}

fn print_files(models: &[file::Model]) {
	let mut table = Table::new();
	table.load_preset(UTF8_BORDERS_ONLY);
	table.set_header(vec!["file_id", "bucket_id", "object_key", "published", "guid"]);
	for model in models {
		table.add_row(vec![
			model.file_id.to_string(),
			model.bucket_id.to_string(),
			model.object_key.clone(),
			model.published.to_string(),
			model.guid.to_string(),
		]);
	}
	println!("{table}");
}

async fn build_context(config: RepoConfig) -> Result<RepoContext> {
	let offline = std::env::var("OFFLINE").map(|v| v == "1").unwrap_or(false);
	let mut ctx = RepoContext::connect(config.clone())
		.await
		.context("failed to connect to repository database")?;

	if !offline {
		let store = OpendalObjectStore::new(S3Credentials {
			access_key: config.s3_access_key.clone(),
			secret_key: config.s3_secret_key.clone(),
			region: config.s3.region.clone(),
			endpoint: config.s3.endpoint.clone(),
		});
		ctx = ctx.with_object_store(Arc::new(store));
	}

	Ok(ctx)
}

#[tokio::main]
async fn main() -> Result<()> {
	tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.init();

	let cli = Cli::parse();
	let config = RepoConfig::load().context("loading s3repo configuration")?;

	if matches!(cli.command, Command::CreateRepository) {
		let ctx = RepoContext::connect(config).await?;
		s3repo_core::create_repository(&ctx.db()).await?;
		println!("repository schema created");
		return Ok(());
	}

	let ctx = build_context(config).await?;

	match cli.command {
		Command::CreateRepository => unreachable!("handled above"),

		Command::AddFile {
			path,
			bucket,
			object_key,
		} => {
			let model = lifecycle::add_file(
				&ctx,
				&path,
				AddFileOptions {
					bucket,
					object_key,
					origin_host_id: None,
					guid: None,
				},
			)
			.await?;
			print_file(&model);
		}

		Command::GetFile { path } => match s3repo_core::get_file(&ctx, &path).await? {
			Some(model) => print_file(&model),
			None => println!("no current version published at {path}"),
		},

		Command::Upload { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			print_file(&lifecycle::upload(&ctx, &target).await?);
		}

		Command::Publish { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			print_file(&lifecycle::publish(&ctx, &target).await?);
		}

		Command::Expire { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			print_file(&lifecycle::expire(&ctx, &target).await?);
		}

		Command::Purge { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			lifecycle::purge(&ctx, &target).await?;
			println!("purged file {file_id}");
		}

		Command::Download { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			print_file(&lifecycle::download(&ctx, &target).await?);
		}

		Command::Unlink { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			lifecycle::unlink(&ctx, &target).await?;
			println!("unlinked local copy of file {file_id}");
		}

		Command::Touch { file_id } => {
			let target = find_file(&ctx, file_id).await?;
			lifecycle::touch(&ctx, &target).await?;
			println!("touched local copy of file {file_id}");
		}

		Command::TagFile { file_id, tags: names } => {
			tags::tag_file(&ctx, file_id, &names).await?;
			println!("tagged file {file_id} with {names:?}");
		}

		Command::TagPath { path_id, tags: names } => {
			tags::tag_path(&ctx, path_id, &names).await?;
			println!("tagged path {path_id} with {names:?}");
		}

		Command::TagDate {
			path_id,
			at,
			granularity,
		} => {
			tags::tag_date(&ctx, path_id, at, granularity.into()).await?;
			println!("tagged path {path_id} with date tags at {at}");
		}

		Command::FindTagged {
			any,
			all,
			exclude,
			published,
		} => {
			let results = query::find_tagged(
				&ctx,
				TagPredicate {
					any,
					all,
					exclude,
					published,
				},
			)
			.await?;
			print_files(&results);
		}

		Command::Backup => {
			let model = s3repo_core::backup::backup_db(&ctx).await?;
			print_file(&model);
		}

		Command::Restore => {
			s3repo_core::backup::restore_db(&ctx).await?;
			println!("repository restored from the newest backup");
		}

		Command::MaintainHost => {
			let report = maintenance::maintain_current_host(&ctx).await?;
			println!("{report:?}");
		}

		Command::MaintainDb => {
			let report = maintenance::maintain_database(&ctx).await?;
			println!("{report:?}");
		}
	}

	Ok(())
}
