//! `execute_*` handlers, one per subcommand. Each owns its own printing;
//! `run()` only owns dispatch and error-to-exit-code translation.

use anyhow::{Context, Result};
use camino::Utf8PathBuf;

use crate::client::Client;

pub async fn execute_serve(host: String, port: u16, work_dir: String) -> Result<()> {
    let cwd = Utf8PathBuf::try_from(std::env::current_dir()?).context("current directory is not valid UTF-8")?;
    let mut config = forgepipe_config::load(&cwd).context("loading configuration")?;
    forgepipe_config::apply_env_overrides(&mut config, &std::env::vars().collect());

    let work_dir = Utf8PathBuf::from(work_dir);
    std::fs::create_dir_all(&work_dir).with_context(|| format!("creating work directory {work_dir}"))?;

    let orchestrator = crate::wiring::build_orchestrator(&config, work_dir).await;

    println!("forgepipe listening on http://{host}:{port}");
    forgepipe_api::serve(forgepipe_api::ApiConfig { host, port }, orchestrator)
        .await
        .context("control api server")
}

pub async fn execute_start(client: &Client, spec_path: &str, tenant: &str, user: &str, project: &str) -> Result<()> {
    let raw = std::fs::read_to_string(spec_path).with_context(|| format!("reading spec file {spec_path}"))?;
    let spec: serde_json::Value = serde_json::from_str(&raw).with_context(|| format!("parsing {spec_path} as JSON"))?;

    let build_id = client.start_build(tenant, user, project, spec).await?;
    println!("started build {build_id}");
    Ok(())
}

pub async fn execute_status(client: &Client, build_id: &str, json: bool) -> Result<()> {
    let build = client.get_build(build_id).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&build)?);
    } else {
        print_build_summary(&build);
    }
    Ok(())
}

pub async fn execute_list(client: &Client, json: bool) -> Result<()> {
    let builds = client.list_builds().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&builds)?);
        return Ok(());
    }
    if builds.is_empty() {
        println!("no builds");
        return Ok(());
    }
    for build in &builds {
        print_build_summary(build);
        println!();
    }
    Ok(())
}

pub async fn execute_cancel(client: &Client, build_id: &str) -> Result<()> {
    client.cancel_build(build_id).await?;
    println!("cancellation requested for {build_id}");
    Ok(())
}

pub async fn execute_retry(client: &Client, build_id: &str) -> Result<()> {
    let new_id = client.retry_build(build_id).await?;
    println!("started retry build {new_id} from the spec of {build_id}");
    Ok(())
}

pub async fn execute_retry_stage(client: &Client, build_id: &str, from: f64) -> Result<()> {
    client.retry_stage(build_id, from).await?;
    println!("resuming {build_id} from stage {from}");
    Ok(())
}

pub async fn execute_watch(client: &Client, build_id: &str) -> Result<()> {
    client
        .watch(build_id, |event| {
            println!("{event}");
        })
        .await?;
    Ok(())
}

fn print_build_summary(build: &forgepipe_core::build::Build) {
    println!("build {}", build.id);
    println!("  tenant:  {}", build.tenant);
    println!("  project: {}", build.project);
    println!("  status:  {:?}", build.status);
    match build.current_stage {
        Some(stage) => println!("  stage:   {stage}"),
        None => println!("  stage:   (not started)"),
    }
    println!("  created: {}", build.created_at);
}
