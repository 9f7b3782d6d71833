use linekv as lkv;

use env_logger::{Builder, Env};
use std::io::Write as _;
use std::path::PathBuf;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(
    name = "linekv",
    about = "A converter between line-oriented typed key/value files and themselves.",
    author = "Yan Zaretskiy"
)]
enum Opt {
    /// Parse a file and write it back out, validating it along the way.
    Encode {
        #[structopt(parse(from_os_str))]
        input: PathBuf,

        #[structopt(parse(from_os_str), short, long)]
        output: Option<PathBuf>,

        /// Force the chunked write strategy with this many records per chunk.
        #[structopt(long)]
        chunk_size: Option<usize>,
    },
    /// Parse a file and report its record count without writing anything.
    Decode {
        #[structopt(parse(from_os_str))]
        input: PathBuf,

        /// Force the chunked read strategy with this many lines per chunk.
        #[structopt(long)]
        chunk_size: Option<usize>,
    },
}

fn init_logger() {
    let env = Env::default()
        .filter_or("LINEKV_LOG_LEVEL", "info")
        .write_style_or("LINEKV_LOG_STYLE", "auto");

    let mut builder = Builder::from_env(env);
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} - {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logger();

    let opt = Opt::from_args();

    match opt {
        Opt::Encode {
            input,
            output,
            chunk_size,
        } => {
            let store = match chunk_size {
                Some(_) => lkv::deserialize_chunked(&input, chunk_size)?,
                None => lkv::deserialize_auto(&input)?,
            };
            log::info!(target: "linekv::cli", "parsed {} records from {:?}", store.len(), input);

            let output = output.unwrap_or_else(|| input.with_extension("out"));
            match chunk_size {
                Some(_) => lkv::serialize_chunked(&store, &output, chunk_size)?,
                None => lkv::serialize_auto(&store, &output)?,
            }
            log::info!(target: "linekv::cli", "wrote {:?}", output);
            Ok(())
        }
        Opt::Decode { input, chunk_size } => {
            let store = match chunk_size {
                Some(_) => lkv::deserialize_chunked(&input, chunk_size)?,
                None => lkv::deserialize_auto(&input)?,
            };
            println!("{} records", store.len());
            Ok(())
        }
    }
}
