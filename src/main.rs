use std::env;
use std::io::{self, Read};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;
use zenith_ssr::template::{ComponentRegistry, JsonTemplateCompiler, PageSpec};
use zenith_ssr::{ComponentInstance, MemoryCache, Renderer, RendererOptions, Sink, WriterSink};

#[derive(Debug)]
struct CliArgs {
    use_cache: bool,
    repeat: usize,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    if let Err(err) = run().await {
        eprintln!("[zenith-ssr] {err:#}");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = parse_args()?;

    let mut stdin_payload = String::new();
    io::stdin()
        .read_to_string(&mut stdin_payload)
        .context("failed to read stdin")?;

    if stdin_payload.trim().is_empty() {
        bail!("stdin payload is empty");
    }

    let page: PageSpec = serde_json::from_str(&stdin_payload).context("invalid input JSON")?;

    let registry = Arc::new(ComponentRegistry::new());
    let (root_options, props) = page.install(&registry);

    let mut options = RendererOptions::default()
        .with_compiler(Arc::new(JsonTemplateCompiler::new(Arc::clone(&registry))));
    let cache = MemoryCache::new();
    if args.use_cache {
        options = options.with_cache(cache.to_render_cache());
    }
    let renderer = Renderer::new(options);

    let mut sink = WriterSink::new(tokio::io::stdout());
    for pass in 0..args.repeat {
        let root = ComponentInstance::root(Arc::clone(&root_options), props.clone());
        let report = renderer.render(&root, &mut sink).await?;
        sink.write("\n".into()).await?;
        sink.finish().await?;
        info!(
            pass,
            cache_hits = report.cache_hits,
            cache_writes = report.cache_writes,
            warnings = report.warnings().count(),
            cached_entries = cache.len(),
            "render complete"
        );
    }

    Ok(())
}

fn parse_args() -> Result<CliArgs> {
    let mut args = CliArgs {
        use_cache: true,
        repeat: 1,
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--no-cache" => args.use_cache = false,
            "--repeat" => {
                let value = iter.next().context("--repeat requires a value")?;
                args.repeat = value
                    .parse()
                    .with_context(|| format!("invalid --repeat value '{value}'"))?;
            }
            other => bail!("unknown argument '{other}'"),
        }
    }
    Ok(args)
}
