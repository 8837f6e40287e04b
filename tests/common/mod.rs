use heart_trail::app::App;
use heart_trail::args::TopLevelCmd;

// Test configs are only ever read, never saved over
#[allow(dead_code)]
pub fn test_args(config: &str) -> TopLevelCmd {
    TopLevelCmd {
        config_override: Some(config.into()),
        config_required: true,
        no_save: true,
        subcommands: None,
    }
}

#[allow(dead_code)]
pub fn build_app(config: &str) -> Result<App, heart_trail::errors::AppError> {
    let arg_config = test_args(config);
    let config_path = arg_config
        .config_override
        .clone()
        .expect("test args always carry a config path");
    App::build(&arg_config, config_path, None)
}
