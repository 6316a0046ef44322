use super::super::args::*;
use crate::exit_codes::SUCCESS;

pub async fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    let config = cli.config.as_deref();
    let db = cli.db.as_deref();
    match cli.cmd {
        Command::Keygen(args) => super::keygen::run(args),
        Command::Call(args) => {
            let service = super::build_service(config, db)?;
            super::call::run(args, &service).await
        }
        Command::Serve => {
            let service = super::build_service(config, db)?;
            super::serve::run(&service).await
        }
        Command::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(SUCCESS)
        }
    }
}
