use argh::FromArgs;
use std::path::PathBuf;

#[derive(FromArgs, Debug, Default)]
/// Decode BLE heart rate measurements and keep a rolling BPM history
pub struct TopLevelCmd {
    /// specify config file path, creates file if it doesn't exist
    #[argh(option, short = 'c')]
    pub config_override: Option<PathBuf>,
    /// config file must exist, including "config_override" files
    #[argh(switch, short = 'r')]
    pub config_required: bool,
    /// use config file as-is (don't save over it)
    #[argh(switch, short = 'n')]
    pub no_save: bool,
    #[argh(subcommand)]
    pub subcommands: Option<SubCommands>,
}

#[derive(FromArgs, Debug, PartialEq, Eq)]
#[argh(subcommand)]
pub enum SubCommands {
    Ble(BleCmd),
    Dummy(DummyCmd),
}

/// connect to a BLE device with the HR Measure characteristic
#[derive(FromArgs, Debug, PartialEq, Eq)]
#[argh(subcommand, name = "ble")]
pub struct BleCmd {
    /// poll the characteristic every N milliseconds instead of subscribing
    #[argh(option, short = 'p')]
    pub poll_ms: Option<u64>,
}

/// feed generated measurement payloads instead of a real device
#[derive(FromArgs, Debug, PartialEq, Eq)]
#[argh(subcommand, name = "dummy")]
pub struct DummyCmd {}
