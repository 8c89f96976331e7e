pub mod health;
pub mod init;
pub mod relay;
pub mod run;
pub mod version;

pub use health::Health;
pub use init::Init;
pub use relay::Relay;
pub use run::Run;
pub use version::Version;
