use clap::Parser;
use eyre::{bail, Result};
use securenn::{
    execution::local::generate_local_identities,
    prelude::*,
    protocol::prf::Prf,
};
use securenn_common::{
    config::{Config, Opt},
    tracing::initialize_tracing,
};

/// Runs the three parties in one process. `Server0` contributes `x`,
/// `Server1` contributes `y`, and the servers open `relu(x)`, `x < y` and
/// `x > y`.
#[derive(Parser)]
struct Args {
    #[clap(short, long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    x: Vec<i64>,

    #[clap(short, long, value_delimiter = ',', allow_hyphen_values = true, required = true)]
    y: Vec<i64>,

    #[clap(flatten)]
    common: Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    if let Err(e) = initialize_tracing() {
        eprintln!("Failed to initialize tracing: {:?}", e);
    }

    let mut config = Config::load_config("SMPC")?;
    config.overwrite_defaults_with_cli_args(args.common);
    let protocol_config = ProtocolConfig::from_config(&config)?;

    if args.x.len() != args.y.len() {
        bail!("x has {} values but y has {}", args.x.len(), args.y.len());
    }
    let len = args.x.len();
    tracing::info!(len, bits = config.bits, prime = config.prime, "starting local session");

    let seeds = (0..3).map(|_| Prf::gen_seed()).collect();
    let runtime = LocalRuntime::new(generate_local_identities(), seeds, protocol_config).await?;

    let (x, y) = (args.x, args.y);
    let outputs = runtime
        .run(move |mut session| {
            let (x, y) = (x.clone(), y.clone());
            async move {
                let ring = session.config().base_ring;
                let role = session.own_role();
                let x_enc = RingVec::from_signed(ring, &x);
                let y_enc = RingVec::from_signed(ring, &y);
                let x_in = (role == Role::Server0).then_some(x_enc.values());
                let y_in = (role == Role::Server1).then_some(y_enc.values());

                let x: Tensor = share(&mut session, Role::Server0, ring, len, x_in, false)
                    .await?
                    .into();
                let y: Tensor = share(&mut session, Role::Server1, ring, len, y_in, false)
                    .await?
                    .into();

                let mut opened = Vec::with_capacity(3);
                for result in [
                    relu(&mut session, &x).await?,
                    less(&mut session, &x, &y).await?,
                    greater(&mut session, &x, &y).await?,
                ] {
                    let result = PrivateTensor::try_from(result)?;
                    opened.push(reveal(&mut session, &result).await?.value().to_signed());
                }
                Ok(opened)
            }
        })
        .await?;

    let [relu_x, less_xy, greater_xy] = &outputs[0][..] else {
        bail!("expected three results from server0");
    };
    println!("relu(x):  {:?}", relu_x);
    println!("x < y:    {:?}", less_xy);
    println!("x > y:    {:?}", greater_xy);
    Ok(())
}
