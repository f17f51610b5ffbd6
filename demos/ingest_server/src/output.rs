use bytes::Bytes;
use clap::ValueEnum;
use ingest_remux::mp4::FlvToMp4;
use ingest_remux::ts::FlvToTs;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Flv,
    Ts,
    Mp4,
}

enum Remuxer {
    Flv,
    Ts(FlvToTs),
    Mp4(FlvToMp4),
}

/// A file receiving a connection's FLV stream, remuxed into the chosen container
pub struct MediaOutput {
    file: BufWriter<File>,
    remuxer: Remuxer,
}

impl MediaOutput {
    pub async fn create(path: &Path, format: OutputFormat) -> std::io::Result<MediaOutput> {
        let file = File::create(path).await?;
        let remuxer = match format {
            OutputFormat::Flv => Remuxer::Flv,
            OutputFormat::Ts => Remuxer::Ts(FlvToTs::new()),
            OutputFormat::Mp4 => Remuxer::Mp4(FlvToMp4::new()),
        };

        Ok(MediaOutput {
            file: BufWriter::new(file),
            remuxer,
        })
    }

    pub async fn write(&mut self, flv: &Bytes) -> std::io::Result<()> {
        let units = match &mut self.remuxer {
            Remuxer::Flv => vec![flv.clone()],
            Remuxer::Ts(transform) => transform.push(flv),
            Remuxer::Mp4(transform) => transform.push(flv),
        };

        for unit in units {
            self.file.write_all(&unit).await?;
        }

        Ok(())
    }

    pub async fn finish(&mut self) -> std::io::Result<()> {
        self.file.flush().await
    }
}
