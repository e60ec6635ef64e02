use clap::clap_app;
use log::{error, info, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use quantile::{
    read_config_json, read_model_json, MinMax, Model, QuantileComputation, QuantileError, Result, RewardBound,
    SolverConfig,
};

fn main() {
    let matches = clap_app!(quantile =>
        (version: "0.1")
        (author: "Thomas Robinson")
        (about: "Reward-bounded reachability quantiles over DTMC and MDP models")
        (@arg MODEL: -m --model <PATH> "Model, takes a json file in the form of transitions e.g.
            {
              \"model_type\": \"mdp\",
              \"num_states\": 3,
              \"initial\": 0,
              \"targets\": [2],
              \"transitions\":
               [{
                  \"s\": 0,
                  \"a\": \"a\",
                  \"s_prime\": [{\"s\": 1,\"p\": 1.0}],
                  \"rewards\": 1
               },{
                  \"s\": 1,
                  \"a\": \"a\",
                  \"s_prime\": [{\"s\": 0,\"p\": 0.5},{\"s\": 2,\"p\": 0.5}]
               },...]
            }
           ")
        (@arg CONFIG: -c --config [PATH] "Solver configuration as json, missing fields take their defaults")
        (@arg BOUND: -b --bound [BOUND] default_value("upper") "Reward bound: upper (<= r) or lower (>= r)")
        (@arg DIRECTION: -d --direction [DIRECTION] default_value("max") "min or max over the choices")
        (@arg STEPS: -s --steps [N] default_value("10") "Last reward step to compute")
        (@arg CSV: --csv [PATH] "Write step,value rows of the initial state")
        (@arg LP_RANGE: --("lp-range") "Solve all steps with a single linear program")
        (@arg VERBOSE: -v --verbose [LEVEL] default_value("1") "Level of verbosity \
           0 - errors \
           1 - results \
           2 - solver debugging \
           3 - iterations")
    )
    .get_matches();

    let level = match matches.value_of("VERBOSE").unwrap_or("1") {
        "0" => LevelFilter::Error,
        "1" => LevelFilter::Info,
        "2" => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        eprintln!("unable to install the logger: {}", e);
    }

    if let Err(e) = run(&matches) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn parse_arg<T: std::str::FromStr<Err = String>>(matches: &clap::ArgMatches, name: &str) -> Result<T> {
    let raw = matches.value_of(name).unwrap_or_default();
    raw.parse::<T>().map_err(QuantileError::InvalidConfig)
}

fn run(matches: &clap::ArgMatches) -> Result<()> {
    let model_path = matches.value_of("MODEL").unwrap_or_default();
    let input = read_model_json(model_path)?;
    let config = match matches.value_of("CONFIG") {
        Some(path) => read_config_json(path)?,
        None => SolverConfig::default(),
    };
    let bound: RewardBound = parse_arg(matches, "BOUND")?;
    let direction: MinMax = parse_arg(matches, "DIRECTION")?;
    let steps: usize = matches
        .value_of("STEPS")
        .unwrap_or_default()
        .parse()
        .map_err(|e| QuantileError::InvalidConfig(format!("--steps: {}", e)))?;
    info!("model: {} states, initial state {}", input.model.num_states(), input.initial);

    let mut computation = QuantileComputation::new(
        &input.model,
        input.target_flags(),
        bound,
        direction,
        config,
        input.unbounded.clone(),
    )?;
    let values: Vec<Vec<f64>> = if matches.is_present("LP_RANGE") {
        computation.solve_range_lp(steps)?
    } else {
        computation.run(steps)?
    };
    for (r, v) in values.iter().enumerate() {
        info!("step {}: {}", r, v[input.initial]);
    }

    if let Some(path) = matches.value_of("CSV") {
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(&["step", "value"])?;
        for (r, v) in values.iter().enumerate() {
            wtr.write_record(&[r.to_string(), v[input.initial].to_string()])?;
        }
        wtr.flush()?;
        info!("wrote {} rows to {}", values.len(), path);
    }
    Ok(())
}
