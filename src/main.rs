use std::process::ExitCode;

use memmap2::Mmap;

use m4a::{aac_to_m4a, extract_audio, extract_raw_audio};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let [_, command, input, output] = args.as_slice() else {
        eprintln!("usage: m4a <remux|raw|mux> <input> <output>");
        return ExitCode::FAILURE;
    };
    match run(command, input, output) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("{error}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: &str, input: &str, output: &str) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::open(input)?;
    let mmap = unsafe { Mmap::map(&file) }?;

    let bytes = match command {
        // MP4 in, audio-only M4A out
        "remux" => extract_audio(&mmap)?,
        // MP4 in, raw elementary stream out
        "raw" => {
            let raw = extract_raw_audio(&mmap)?;
            println!("{}", raw.codec);
            raw.data
        }
        // raw ADTS in, M4A out
        "mux" => aac_to_m4a(&mmap)?,
        _ => return Err(format!("unknown command: {command}").into()),
    };
    std::fs::write(output, bytes)?;
    Ok(())
}
