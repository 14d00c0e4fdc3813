use std::path::PathBuf;
use std::str::FromStr;
use std::time::Instant;

use colored::Colorize;
use structopt::StructOpt;

use gnss_track::channel::{AcquisitionHandoff, TrackingChannel};
use gnss_track::config::ChannelConfig;
use gnss_track::control::control_queue;
use gnss_track::source::{FileSampleSource, IqSampleFormat, SampleSource};

#[derive(StructOpt)]
#[structopt(name = "gnss-track", about = "single-channel GPS L1 C/A tracking loop")]
struct Options {
    #[structopt(short = "f", long, default_value = "recording.iq")]
    file: PathBuf,
    #[structopt(short = "t", long, default_value = "2xf32")]
    iq_format: String,
    #[structopt(long, default_value = "4000000")]
    sample_rate: f64,
    #[structopt(long, default_value = "1")]
    prn: u8,
    #[structopt(long, default_value = "0.0")]
    doppler_hz: f64,
    #[structopt(long, default_value = "0.0")]
    code_phase_samples: f64,
    #[structopt(long, default_value = "25.0")]
    pll_bw_hz: f64,
    #[structopt(long, default_value = "2.0")]
    dll_bw_hz: f64,
    #[structopt(long, default_value = "0.5")]
    early_late_spc_chips: f64,
    #[structopt(long, default_value = "4092")]
    vector_length: usize,
    #[structopt(long, default_value = "1000")]
    num_epochs: usize,
    #[structopt(long)]
    dump: bool,
    #[structopt(long, default_value = "track_ch")]
    dump_filename: String,
    #[structopt(long, short = "v")]
    verbose: bool,
}

fn main() -> std::io::Result<()> {
    let opt = Options::from_args();
    let level = if opt.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let format = IqSampleFormat::from_str(&opt.iq_format)
        .unwrap_or_else(|e| panic!("{}", format!("{e}").red()));

    println!(
        "gnss-track: {} -- {} PRN{} @ {} Hz sample_rate",
        opt.file.to_str().unwrap_or("?").green(),
        format,
        opt.prn,
        opt.sample_rate.to_string().bold(),
    );

    let config = ChannelConfig {
        if_freq_hz: 0.0,
        fs_in_hz: opt.sample_rate,
        pll_bw_hz: opt.pll_bw_hz,
        dll_bw_hz: opt.dll_bw_hz,
        early_late_spc_chips: opt.early_late_spc_chips,
        vector_length: opt.vector_length,
        replica_policy: gnss_track::config::ReplicaPolicy::PreSampled,
        dump: opt.dump,
        dump_filename: opt.dump_filename,
        port: None,
    };

    let (control_tx, control_rx) = control_queue(4);
    let mut channel = TrackingChannel::new(0, config, control_tx)
        .unwrap_or_else(|e| panic!("{}", format!("failed to construct channel: {e}").red()));
    let mut source = FileSampleSource::new(opt.file, format);

    channel
        .start_tracking(AcquisitionHandoff {
            prn: opt.prn,
            acq_code_phase_samples: opt.code_phase_samples,
            acq_doppler_hz: opt.doppler_hz,
            acq_sample_stamp: 0,
            system_tag: b'G',
        })
        .unwrap_or_else(|e| panic!("{}", format!("start_tracking rejected: {e}").red()));

    let ts = Instant::now();
    for epoch in 0..opt.num_epochs {
        let n = channel.next_epoch_len_samples().max(1);
        let samples = match source.read(n) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("sample source exhausted after {epoch} epochs: {e}");
                break;
            }
        };
        let (measurement, _consumed) = channel.general_work(&samples);

        if epoch % 100 == 0 {
            log::info!(
                "epoch {epoch}: doppler={:.1} Hz cn0={:.1} dB-Hz prompt=({:.1}, {:.1})",
                measurement.carrier_doppler_hz,
                measurement.cn0_db_hz,
                measurement.prompt_i,
                measurement.prompt_q,
            );
        }
        if let Ok(event) = control_rx.try_recv() {
            log::warn!("control event: channel {} code {}", event.channel_id, event.event_code);
        }
    }

    println!("duration: {} msec", ts.elapsed().as_millis());
    Ok(())
}
