use heart_trail::args::TopLevelCmd;
use heart_trail::run_headless;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() {
    let arg_config: TopLevelCmd = argh::from_env();

    let parent_token = CancellationToken::new();
    let ctrl_c_token = parent_token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c_token.cancel();
        }
    });

    if let Err(e) = run_headless(arg_config, parent_token).await {
        eprintln!("heart-trail: {e}");
        std::process::exit(1);
    }
}
