use std::collections::HashMap;
use std::fs;
use std::fs::File;
use std::io;
use std::path::Path as FsPath;

use ndarray::prelude::*;

use super::choice_model::ChoiceSet;
use super::error::Result;
use super::path_alternatives::PathAlternativeList;
use super::path_network::NodeId;


/// The values computed for one pair of zones.  `logsums` has one entry per market segment.
#[derive(Clone, Debug, PartialEq)]
pub struct OdResult {
    pub origin_zone: u32,
    pub destination_zone: u32,
    pub logsums: Vec<f64>,
    pub distance: f64,
}

impl OdResult {
    pub fn sentinel(origin_zone: u32, destination_zone: u32, num_segments: usize, value: f64)
                    -> OdResult {
        return OdResult {
            origin_zone,
            destination_zone,
            logsums: vec![value; num_segments],
            distance: value,
        };
    }
}


/// Receives batches of results from the OD driver.  Only one thread writes to a sink.
pub trait ResultSink {
    fn write_results(&mut self, results: &[OdResult]) -> Result<()>;

    fn finish(&mut self) -> Result<()> {
        return Ok(());
    }
}


/// Writes one row per OD pair, with a column for each segment's logsum and one for travel time.
pub struct CsvLogsumWriter<W: io::Write> {
    writer: csv::Writer<W>,
    minutes_per_distance: f64,
    sentinel_value: f64,
}

impl CsvLogsumWriter<File> {
    pub fn from_path(path: &FsPath, segment_names: &[String], minutes_per_distance: f64,
                     sentinel_value: f64) -> Result<CsvLogsumWriter<File>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        return CsvLogsumWriter::new(file, segment_names, minutes_per_distance, sentinel_value);
    }
}

impl<W: io::Write> CsvLogsumWriter<W> {
    pub fn new(inner: W, segment_names: &[String], minutes_per_distance: f64,
               sentinel_value: f64) -> Result<CsvLogsumWriter<W>> {
        let mut writer = csv::Writer::from_writer(inner);
        let mut header = vec!["i", "j"];
        header.extend(segment_names.iter().map(|ss| ss.as_str()));
        header.push("time");
        writer.write_record(&header)?;
        return Ok(CsvLogsumWriter {writer, minutes_per_distance, sentinel_value});
    }

    pub fn into_inner(self) -> Result<W> {
        return self.writer.into_inner().map_err(|err| err.into_error().into());
    }
}

impl<W: io::Write> ResultSink for CsvLogsumWriter<W> {
    fn write_results(&mut self, results: &[OdResult]) -> Result<()> {
        for result in results {
            let time = if result.distance == self.sentinel_value {
                self.sentinel_value
            } else {
                result.distance * self.minutes_per_distance
            };
            let mut record = vec![result.origin_zone.to_string(),
                                  result.destination_zone.to_string()];
            record.extend(result.logsums.iter().map(|ls| ls.to_string()));
            record.push(time.to_string());
            self.writer.write_record(&record)?;
        }
        return Ok(());
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush()?;
        return Ok(());
    }
}


/// Holds results in memory as zone-by-zone matrices.  Cells with no result hold the fill value.
pub struct LogsumMatrix {
    segment_names: Vec<String>,
    origin_idxs: HashMap<u32, usize>,
    destination_idxs: HashMap<u32, usize>,
    logsums: Vec<Array<f64, Ix2>>,
    distances: Array<f64, Ix2>,
}

impl LogsumMatrix {
    pub fn new(origin_zones: &[u32], destination_zones: &[u32], segment_names: &[String],
               fill_value: f64) -> LogsumMatrix {
        let shape = (origin_zones.len(), destination_zones.len());
        let filled = Array::ones(shape) * fill_value;
        return LogsumMatrix {
            segment_names: segment_names.to_vec(),
            origin_idxs: origin_zones.iter().enumerate().map(|(ii, zz)| (*zz, ii)).collect(),
            destination_idxs: destination_zones.iter().enumerate()
                .map(|(ii, zz)| (*zz, ii))
                .collect(),
            logsums: vec![filled.clone(); segment_names.len()],
            distances: filled,
        };
    }

    fn cell(&self, origin_zone: u32, destination_zone: u32) -> Option<(usize, usize)> {
        let row = self.origin_idxs.get(&origin_zone)?;
        let col = self.destination_idxs.get(&destination_zone)?;
        return Some((*row, *col));
    }

    pub fn segment_names(&self) -> &[String] {
        return &self.segment_names;
    }

    pub fn logsum(&self, segment: &str, origin_zone: u32, destination_zone: u32)
                  -> Option<f64> {
        let seg_idx = self.segment_names.iter().position(|ss| ss == segment)?;
        let cell = self.cell(origin_zone, destination_zone)?;
        return Some(self.logsums[seg_idx][cell]);
    }

    pub fn distance(&self, origin_zone: u32, destination_zone: u32) -> Option<f64> {
        let cell = self.cell(origin_zone, destination_zone)?;
        return Some(self.distances[cell]);
    }

    pub fn logsum_array(&self, segment_idx: usize) -> &Array<f64, Ix2> {
        return &self.logsums[segment_idx];
    }

    pub fn distance_array(&self) -> &Array<f64, Ix2> {
        return &self.distances;
    }
}

impl ResultSink for LogsumMatrix {
    fn write_results(&mut self, results: &[OdResult]) -> Result<()> {
        for result in results {
            let cell = match self.cell(result.origin_zone, result.destination_zone) {
                Some(cell) => cell,
                None => {
                    log::warn!("no matrix cell for zones ({}, {})", result.origin_zone,
                               result.destination_zone);
                    continue;
                }
            };
            for (matrix, logsum) in self.logsums.iter_mut().zip(&result.logsums) {
                matrix[cell] = *logsum;
            }
            self.distances[cell] = result.distance;
        }
        return Ok(());
    }
}


/// The demand assigned to one directed edge.
#[derive(Clone, Debug, PartialEq)]
pub struct EdgeVolume {
    pub from: NodeId,
    pub to: NodeId,
    pub volume: f64,
}

/// Receives the edge volumes of a finished assignment, ordered by (from, to).
pub trait VolumeSink {
    fn write_volumes(&mut self, volumes: &[EdgeVolume]) -> Result<()>;
}

impl VolumeSink for Vec<EdgeVolume> {
    fn write_volumes(&mut self, volumes: &[EdgeVolume]) -> Result<()> {
        self.extend_from_slice(volumes);
        return Ok(());
    }
}

pub struct CsvVolumeWriter<W: io::Write> {
    writer: csv::Writer<W>,
}

impl CsvVolumeWriter<File> {
    pub fn from_path(path: &FsPath) -> Result<CsvVolumeWriter<File>> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        return CsvVolumeWriter::new(File::create(path)?);
    }
}

impl<W: io::Write> CsvVolumeWriter<W> {
    pub fn new(inner: W) -> Result<CsvVolumeWriter<W>> {
        let mut writer = csv::Writer::from_writer(inner);
        writer.write_record(&["from", "to", "volume"])?;
        return Ok(CsvVolumeWriter {writer});
    }

    pub fn into_inner(self) -> Result<W> {
        return self.writer.into_inner().map_err(|err| err.into_error().into());
    }
}

impl<W: io::Write> VolumeSink for CsvVolumeWriter<W> {
    fn write_volumes(&mut self, volumes: &[EdgeVolume]) -> Result<()> {
        for edge_volume in volumes {
            self.writer.write_record(&[edge_volume.from.to_string(), edge_volume.to.to_string(),
                                       edge_volume.volume.to_string()])?;
        }
        self.writer.flush()?;
        return Ok(());
    }
}


/// Writes every alternative generated for traced OD pairs, for checking the path search against
/// expectations.  `paths.csv` has one row per path, and `links.csv` one row per edge of each path.
pub struct PathTraceWriter {
    paths: csv::Writer<File>,
    links: csv::Writer<File>,
}

impl PathTraceWriter {
    pub fn new(dir: &FsPath) -> Result<PathTraceWriter> {
        fs::create_dir_all(dir)?;
        let mut paths = csv::Writer::from_path(dir.join("paths.csv"))?;
        paths.write_record(&["origin", "destination", "path", "cost", "distance", "path_size",
                             "probability"])?;
        let mut links = csv::Writer::from_path(dir.join("links.csv"))?;
        links.write_record(&["origin", "destination", "path", "leg", "from", "to"])?;
        return Ok(PathTraceWriter {paths, links});
    }

    pub fn write_alternatives(&mut self, origin_zone: u32, destination_zone: u32,
                              alternatives: &PathAlternativeList, choice_set: &ChoiceSet,
                              probabilities: &[f64]) -> Result<()> {
        let od = [origin_zone.to_string(), destination_zone.to_string()];
        let rows = alternatives.paths().iter()
            .zip(&choice_set.alternatives)
            .zip(probabilities)
            .enumerate();
        for (ii, ((path, attrs), prob)) in rows {
            self.paths.write_record(&[
                od[0].clone(), od[1].clone(), ii.to_string(), path.cost().to_string(),
                attrs.distance.to_string(), attrs.path_size.to_string(), prob.to_string(),
            ])?;
            for (leg, pair) in path.nodes().windows(2).enumerate() {
                self.links.write_record(&[
                    od[0].clone(), od[1].clone(), ii.to_string(), leg.to_string(),
                    pair[0].to_string(), pair[1].to_string(),
                ])?;
            }
        }
        return Ok(());
    }

    pub fn flush(&mut self) -> Result<()> {
        self.paths.flush()?;
        self.links.flush()?;
        return Ok(());
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;
    use super::super::choice_model::{PathChoiceModel, TravelerContext};
    use super::super::path_network::ActiveMode;
    use super::super::path_search::{PathSearch, SearchParameters};
    use super::super::test_utils::{diamond_network, NODE_A, NODE_D};

    type Row = HashMap<String, String>;

    fn results() -> Vec<OdResult> {
        return vec![
            OdResult {origin_zone: 1, destination_zone: 2, logsums: vec![-1.5, -2.5],
                      distance: 4.0},
            OdResult::sentinel(1, 3, 2, -999.0),
        ];
    }

    #[test]
    fn test_csv_writer() {
        let names = vec![String::from("male"), String::from("female")];
        let mut writer = CsvLogsumWriter::new(vec![], &names, 0.5, -999.0).unwrap();
        writer.write_results(&results()).unwrap();
        writer.finish().unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["i,j,male,female,time", "1,2,-1.5,-2.5,2",
                               "1,3,-999,-999,-999"]);
    }

    #[test]
    fn test_csv_writer_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("logsums.csv");
        let names = vec![String::from("logsum")];
        let mut writer = CsvLogsumWriter::from_path(&path, &names, 1.0, -999.0).unwrap();
        writer.write_results(&[OdResult {origin_zone: 4, destination_zone: 7,
                                         logsums: vec![-0.25], distance: 1.5}]).unwrap();
        writer.finish().unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<Row> = reader.deserialize().map(|rr| rr.unwrap()).collect();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["i"], "4");
        assert_eq!(rows[0]["j"], "7");
        assert_relative_eq!(rows[0]["logsum"].parse::<f64>().unwrap(), -0.25);
        assert_relative_eq!(rows[0]["time"].parse::<f64>().unwrap(), 1.5);
    }

    #[test]
    fn test_volume_writer() {
        let volumes = vec![
            EdgeVolume {from: 1, to: 2, volume: 5.0},
            EdgeVolume {from: 2, to: 1, volume: 0.0},
        ];
        let mut writer = CsvVolumeWriter::new(vec![]).unwrap();
        writer.write_volumes(&volumes).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();
        assert_eq!(text.lines().collect::<Vec<&str>>(), vec!["from,to,volume", "1,2,5", "2,1,0"]);

        let dir = tempdir().unwrap();
        let path = dir.path().join("out").join("volumes.csv");
        CsvVolumeWriter::from_path(&path).unwrap().write_volumes(&volumes).unwrap();
        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(reader.records().count(), 2);
    }

    #[test]
    fn test_matrix_sink() {
        let names = vec![String::from("male"), String::from("female")];
        let mut matrix = LogsumMatrix::new(&[1, 2], &[1, 2, 3], &names, f64::NAN);
        matrix.write_results(&results()).unwrap();
        // unknown zones are skipped
        matrix.write_results(&[OdResult::sentinel(9, 1, 2, 0.0)]).unwrap();

        assert_eq!(matrix.logsum("male", 1, 2), Some(-1.5));
        assert_eq!(matrix.logsum("female", 1, 2), Some(-2.5));
        assert_eq!(matrix.logsum("female", 1, 3), Some(-999.0));
        assert_eq!(matrix.distance(1, 2), Some(4.0));
        assert!(matrix.logsum("male", 2, 2).unwrap().is_nan());
        assert_eq!(matrix.logsum("elderly", 1, 2), None);
        assert_eq!(matrix.distance(1, 9), None);
        assert_eq!(matrix.logsum_array(0).shape(), &[2, 3]);
        assert_eq!(matrix.distance_array()[[0, 1]], 4.0);
    }

    #[test]
    fn test_trace_writer() {
        let network = diamond_network(false);
        let mut params = SearchParameters::default();
        params.max_alternatives = 2;
        let search = PathSearch::new(&network, ActiveMode::Bike, params);
        let alternatives = search.alternatives(NODE_A, NODE_D).unwrap();
        let choice_set = ChoiceSet::from_alternatives(&network, &alternatives, ActiveMode::Bike)
            .unwrap();
        let model = PathChoiceModel::new(ActiveMode::Bike, vec![]);
        let probs = model.choice_probabilities(&choice_set, &TravelerContext::default())
            .unwrap();

        let dir = tempdir().unwrap();
        let mut tracer = PathTraceWriter::new(dir.path()).unwrap();
        tracer.write_alternatives(1, 2, &alternatives, &choice_set, &probs).unwrap();
        tracer.flush().unwrap();

        let mut reader = csv::Reader::from_path(dir.path().join("paths.csv")).unwrap();
        let paths: Vec<Row> = reader.deserialize().map(|rr| rr.unwrap()).collect();
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[1]["path"], "1");
        assert_relative_eq!(paths[0]["probability"].parse::<f64>().unwrap(), 0.5);
        assert_relative_eq!(paths[0]["distance"].parse::<f64>().unwrap(), 2.0);

        let mut reader = csv::Reader::from_path(dir.path().join("links.csv")).unwrap();
        let links: Vec<Row> = reader.deserialize().map(|rr| rr.unwrap()).collect();
        assert_eq!(links.len(), 4);
        assert_eq!(links[0]["from"], NODE_A.to_string());
        assert_eq!(links[1]["to"], NODE_D.to_string());
    }
}
