use rocket::figment::Figment;
use std::{net::IpAddr, path::PathBuf};
use webhook::Injector;

#[derive(Debug, clap::Args)]
pub struct ServerArgs {
    /// Address to listen on.
    #[arg(long, env = "INJECTOR_ADDRESS", default_value = "0.0.0.0")]
    pub address: IpAddr,
    #[arg(long, env = "INJECTOR_PORT", default_value_t = 8443)]
    pub port: u16,
    /// X.509 certificate for HTTPS (PEM).
    #[arg(long, env = "INJECTOR_CERT", default_value = "/etc/webhook/certs/cert.pem")]
    pub cert: PathBuf,
    /// Private key of the certificate (PEM).
    #[arg(long, env = "INJECTOR_KEY", default_value = "/etc/webhook/certs/key.pem")]
    pub key: PathBuf,
    /// Namespaces where injection is refused.
    #[arg(
        long,
        env = "INJECTOR_EXCLUDED_NAMESPACES",
        value_delimiter = ',',
        default_value = "kube-system,kube-public"
    )]
    pub excluded_namespaces: Vec<String>,
}

impl ServerArgs {
    /// Rocket configuration: defaults and `ROCKET_*` variables, overridden by
    /// the command line.
    pub fn figment(&self) -> Figment {
        rocket::Config::figment()
            .merge(("address", self.address))
            .merge(("port", self.port))
            .merge(("tls.certs", self.cert.clone()))
            .merge(("tls.key", self.key.clone()))
    }

    pub fn injector(&self) -> Injector {
        Injector::new(self.excluded_namespaces.iter().cloned())
    }
}
