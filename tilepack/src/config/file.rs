use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs::File;
use std::io::{Read as _, Write as _};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use subst::VariableMap;
use tilepack_tile_utils::GeoExtent;
use tracing::{info, warn};

use crate::config::{Args, ConfigFileError, ConfigFileResult};
use crate::job::GenerationJob;
use crate::render::{GraticuleConfig, LayerSet, TileProjection, TileSize};
use crate::{TilepackError, TilepackResult};

pub type UnrecognizedValues = BTreeMap<String, serde_yaml::Value>;

/// Settings of a generation run, as stored in a YAML config file.
///
/// Every field is optional; [`Config::to_job`] applies the defaults and validates
/// the combination.
#[serde_with::skip_serializing_none]
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Path of the container to create
    pub output: Option<PathBuf>,

    /// Extents to render, as `west,south,east,north` strings; their union is used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bbox: Vec<GeoExtent>,

    pub min_zoom: Option<u8>,
    pub max_zoom: Option<u8>,

    /// Explicit zoom levels, used when `max_zoom` is not set
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zoom_levels: Vec<u8>,

    /// Wrap the container into a zip archive
    pub bundle: Option<bool>,

    pub tile_size: Option<TileSize>,
    pub render_margin: Option<u32>,
    pub tile_epsg: Option<TileProjection>,

    #[serde(default, skip_serializing_if = "LayerSet::is_empty")]
    pub layers: LayerSet,

    /// Report progress after this many tiles
    pub progress_every: Option<u64>,

    /// Look of the built-in graticule renderer
    pub graticule: Option<GraticuleConfig>,

    #[serde(flatten, skip_serializing)]
    pub unrecognized: UnrecognizedValues,
}

impl Config {
    /// Overrides file values with the ones given on the command line.
    pub fn merge_args(&mut self, args: &Args) {
        if let Some(output) = &args.output {
            self.output = Some(output.clone());
        }
        if !args.bbox.is_empty() {
            self.bbox.clone_from(&args.bbox);
        }
        if args.max_zoom.is_some() || args.min_zoom.is_some() || !args.zoom_levels.is_empty() {
            self.min_zoom = args.min_zoom;
            self.max_zoom = args.max_zoom;
            self.zoom_levels.clone_from(&args.zoom_levels);
        }
        if args.bundle {
            self.bundle = Some(true);
        }
        if args.tile_size.is_some() {
            self.tile_size = args.tile_size;
        }
        if args.render_margin.is_some() {
            self.render_margin = args.render_margin;
        }
        if let Some(epsg) = args.tile_epsg {
            self.tile_epsg = Some(TileProjection(epsg));
        }
        if !args.layers.is_empty() {
            self.layers = args.layers.iter().cloned().collect();
        }
        if args.progress_every.is_some() {
            self.progress_every = args.progress_every;
        }
    }

    /// Reports unknown keys. Returns them so callers can decide how strict to be.
    pub fn finalize(&mut self) -> Vec<String> {
        let keys: Vec<String> = self.unrecognized.keys().cloned().collect();
        for key in &keys {
            warn!(
                "Ignoring unrecognized configuration key '{key}'. Please check your configuration file for typos."
            );
        }
        keys
    }

    /// Union of all configured extents.
    #[must_use]
    pub fn extent(&self) -> GeoExtent {
        self.bbox
            .iter()
            .fold(GeoExtent::NULL, |acc, ext| acc.combine(ext))
    }

    /// Zoom levels to render: `min_zoom..=max_zoom` when `max_zoom` is set,
    /// the explicit list otherwise.
    pub fn zooms(&self) -> TilepackResult<Vec<u8>> {
        if let Some(max_zoom) = self.max_zoom {
            let min_zoom = self.min_zoom.unwrap_or(0);
            if min_zoom > max_zoom {
                return Err(TilepackError::InvalidZoomRange(min_zoom, max_zoom));
            }
            Ok((min_zoom..=max_zoom).collect())
        } else if self.zoom_levels.is_empty() {
            Err(TilepackError::NoZoomLevels)
        } else {
            Ok(self.zoom_levels.clone())
        }
    }

    /// Builds the job described by this configuration.
    pub fn to_job(&self) -> TilepackResult<GenerationJob> {
        let output = self.output.clone().ok_or(TilepackError::NoOutput)?;
        if let Some(parent) = output.parent()
            && !parent.as_os_str().is_empty()
            && !parent.is_dir()
        {
            return Err(TilepackError::MissingOutputDirectory(parent.to_path_buf()));
        }
        if output.extension() != Some(OsStr::new(qgisweb::CONTAINER_EXTENSION)) {
            warn!(
                "Output file {} does not use the .{} extension",
                output.display(),
                qgisweb::CONTAINER_EXTENSION
            );
        }

        if self.bbox.is_empty() {
            return Err(TilepackError::NoExtent);
        }
        let mut job = GenerationJob::new(output, self.extent(), self.zooms()?);

        if let Some(size) = self.tile_size {
            if size.width == 0 || size.height == 0 {
                return Err(TilepackError::InvalidTileSize(size.width, size.height));
            }
            job.tile_size = size;
        }
        if let Some(margin) = self.render_margin {
            job.render_margin = margin;
        }
        if let Some(projection) = self.tile_epsg {
            job.projection = projection;
        }
        if let Some(every) = self.progress_every {
            job.progress_every = every.max(1);
        }
        job.bundle = self.bundle.unwrap_or(false);
        job.layers = self.layers.clone();
        Ok(job)
    }

    /// Writes the configuration as YAML, or prints it to stdout when `file_name` is `-`.
    pub fn save_to_file(&self, file_name: &Path) -> ConfigFileResult<()> {
        let yaml = serde_yaml::to_string(&self).map_err(ConfigFileError::ConfigSerializeError)?;
        if file_name.as_os_str() == OsStr::new("-") {
            info!("Current configuration:");
            println!("\n\n{yaml}\n");
            Ok(())
        } else {
            info!(
                "Saving config to {}, use --config to load it",
                file_name.display()
            );
            File::create(file_name)
                .map_err(|e| ConfigFileError::ConfigWriteError(e, file_name.to_path_buf()))?
                .write_all(yaml.as_bytes())
                .map_err(|e| ConfigFileError::ConfigWriteError(e, file_name.to_path_buf()))?;
            Ok(())
        }
    }
}

/// Reads a config file, substituting `${VAR}` references from `env`.
pub fn read_config<'a, M>(file_name: &Path, env: &'a M) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    let mut file =
        File::open(file_name).map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)
        .map_err(|e| ConfigFileError::ConfigLoadError(e, file_name.into()))?;
    parse_config(&contents, env, file_name)
}

pub fn parse_config<'a, M>(contents: &str, env: &'a M, file_name: &Path) -> ConfigFileResult<Config>
where
    M: VariableMap<'a>,
    M::Value: AsRef<str>,
{
    subst::yaml::from_str(contents, env)
        .map_err(|e| ConfigFileError::ConfigParseError(e, file_name.into()))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use clap::Parser as _;
    use image::Rgba;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;
    use crate::render::Color;

    fn parse(yaml: &str) -> Config {
        let env = HashMap::from([("OUT_DIR".to_string(), "/tmp/tiles".to_string())]);
        parse_config(yaml, &env, Path::new("test.yaml")).unwrap()
    }

    #[test]
    fn test_parse_full() {
        let config = parse(indoc! {"
            output: ${OUT_DIR}/berlin.qgisweb
            bbox:
              - 13.3,52.4,13.5,52.6
            min_zoom: 8
            max_zoom: 12
            bundle: true
            tile_size: 512
            render_margin: 64
            tile_epsg: 900913
            layers:
              - background
              - graticule
            progress_every: 5
            graticule:
              spacing: 0.5
              color: '#ff0000'
        "});
        assert_eq!(
            config,
            Config {
                output: Some(PathBuf::from("/tmp/tiles/berlin.qgisweb")),
                bbox: vec![GeoExtent::new(13.3, 52.4, 13.5, 52.6)],
                min_zoom: Some(8),
                max_zoom: Some(12),
                bundle: Some(true),
                tile_size: Some(TileSize::square(512)),
                render_margin: Some(64),
                tile_epsg: Some(TileProjection::GOOGLE_MERCATOR),
                layers: ["background", "graticule"].into_iter().collect(),
                progress_every: Some(5),
                graticule: Some(GraticuleConfig {
                    spacing: 0.5,
                    color: Color(Rgba([255, 0, 0, 255])),
                    ..GraticuleConfig::default()
                }),
                ..Default::default()
            }
        );
    }

    #[test]
    #[traced_test]
    fn test_unrecognized_keys() {
        let mut config = parse(indoc! {"
            max_zoom: 3
            max_zom: 4
        "});
        assert_eq!(config.finalize(), vec!["max_zom".to_string()]);
        assert!(logs_contain("Ignoring unrecognized configuration key 'max_zom'"));
    }

    #[test]
    fn test_missing_env_var() {
        let env: HashMap<String, String> = HashMap::new();
        let err = parse_config("output: ${NOPE}/a.qgisweb", &env, Path::new("cfg.yaml")).unwrap_err();
        assert!(matches!(err, ConfigFileError::ConfigParseError(_, _)));
        assert!(err.to_string().starts_with("Unable to parse config file cfg.yaml"));
    }

    #[test]
    fn test_args_override_file() {
        let mut config = parse(indoc! {"
            output: a.qgisweb
            bbox: [ '0,0,1,1' ]
            max_zoom: 12
            layers: [ background ]
        "});
        let args = Args::parse_from([
            "tilepack",
            "--zoom-levels",
            "2,4",
            "--layer",
            "graticule",
            "--tile-epsg",
            "4326",
        ]);
        config.merge_args(&args);
        assert_eq!(config.max_zoom, None);
        assert_eq!(config.zooms().unwrap(), vec![2, 4]);
        assert_eq!(config.layers, ["graticule"].into_iter().collect());
        assert_eq!(config.tile_epsg, Some(TileProjection(4326)));
        assert_eq!(config.output, Some(PathBuf::from("a.qgisweb")));
        assert_eq!(config.bundle, None);
    }

    #[test]
    fn test_to_job() {
        let config = Config {
            output: Some(PathBuf::from("out.qgisweb")),
            bbox: vec![
                GeoExtent::new(0.0, 0.0, 1.0, 1.0),
                GeoExtent::new(-2.0, 0.5, 0.5, 3.0),
            ],
            zoom_levels: vec![5, 3, 5, 1],
            progress_every: Some(0),
            ..Default::default()
        };
        let job = config.to_job().unwrap();
        assert_eq!(job.extent, GeoExtent::new(-2.0, 0.0, 1.0, 3.0));
        assert_eq!(job.zooms, vec![1, 3, 5]);
        assert_eq!(job.tile_size, TileSize::square(256));
        assert_eq!(job.render_margin, 1000);
        assert_eq!(job.projection, TileProjection::WEB_MERCATOR);
        assert_eq!(job.progress_every, 1);
        assert!(!job.bundle);
    }

    #[test]
    fn test_to_job_errors() {
        let base = Config {
            output: Some(PathBuf::from("out.qgisweb")),
            bbox: vec![GeoExtent::new(0.0, 0.0, 1.0, 1.0)],
            max_zoom: Some(2),
            ..Default::default()
        };
        assert!(base.to_job().is_ok());

        let cfg = Config {
            output: None,
            ..base.clone()
        };
        assert!(matches!(cfg.to_job(), Err(TilepackError::NoOutput)));

        let cfg = Config {
            bbox: Vec::new(),
            ..base.clone()
        };
        assert!(matches!(cfg.to_job(), Err(TilepackError::NoExtent)));

        let cfg = Config {
            max_zoom: None,
            ..base.clone()
        };
        assert!(matches!(cfg.to_job(), Err(TilepackError::NoZoomLevels)));

        let cfg = Config {
            min_zoom: Some(4),
            ..base.clone()
        };
        assert!(matches!(
            cfg.to_job(),
            Err(TilepackError::InvalidZoomRange(4, 2))
        ));

        let cfg = Config {
            tile_size: Some(TileSize {
                width: 0,
                height: 256,
            }),
            ..base.clone()
        };
        assert!(matches!(
            cfg.to_job(),
            Err(TilepackError::InvalidTileSize(0, 256))
        ));

        let cfg = Config {
            output: Some(PathBuf::from("/definitely/not/here/out.qgisweb")),
            ..base
        };
        assert!(matches!(
            cfg.to_job(),
            Err(TilepackError::MissingOutputDirectory(_))
        ));
    }

    #[test]
    fn test_save_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let config = Config {
            output: Some(PathBuf::from("tiles.qgisweb")),
            bbox: vec![GeoExtent::new(0.0, 0.0, 0.01, 0.01)],
            zoom_levels: vec![10],
            tile_size: Some(TileSize {
                width: 512,
                height: 256,
            }),
            layers: ["background"].into_iter().collect(),
            graticule: Some(GraticuleConfig::default()),
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();

        let env: HashMap<String, String> = HashMap::new();
        assert_eq!(read_config(&path, &env).unwrap(), config);
    }
}
