/// Sends on a broadcast channel, ignoring the "no receivers" case.
/// Presentation layers are optional, nobody listening isn't an error.
#[macro_export]
macro_rules! broadcast {
    ($tx:expr, $data:expr) => {
        let _ = $tx.send($data.into());
    };
}
