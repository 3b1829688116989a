//! Validates a digitizer settings file and prints the resolved configuration
//! or everything that is wrong with it.

use std::process::ExitCode;

use wingbeat_digitizer::{HardwareModel, ResolvedConfiguration, Settings, BUILTIN_MODELS};

fn main() -> ExitCode {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        eprintln!("usage: wingbeat-check <settings.toml> [model]");
        return ExitCode::from(2);
    };
    let model_id = args.next().unwrap_or_else(|| "CSE161G".into());
    let Some(model) = HardwareModel::builtin(&model_id) else {
        let known = BUILTIN_MODELS.iter()
            .map(|model| model.id)
            .collect::<Vec<_>>()
            .join(", ");
        eprintln!("unknown model {:?} (known models: {})", model_id, known);
        return ExitCode::from(2);
    };

    log::info!("checking {} against the {}", path, model.id);
    let result = Settings::from_file(&path)
        .and_then(|settings| ResolvedConfiguration::derive(&settings, model));
    match result {
        Ok(config) => {
            println!("{:#?}", config);
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("{}: {}", path, error);
            ExitCode::FAILURE
        }
    }
}
