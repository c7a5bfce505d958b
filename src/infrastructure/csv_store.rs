// CSV store
// Semicolon-delimited datasets, cluster files and solutions

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::application::pipeline::ClusterProblem;
use crate::domain::{CrossElasticityEdge, GlobalSolution, PriceOption, PricingData};
use crate::error::DataError;

const DELIMITER: u8 = b';';
const PRICES_SUFFIX: &str = "_elasticity_prices.csv";
const ELASTICITIES_SUFFIX: &str = "_cross_elasticity_prices.csv";

/// Paths of one cluster's price and elasticity files
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterFiles {
    /// File stem shared by both files, e.g. `cluster_subgraph1`
    pub name: String,
    pub prices: PathBuf,
    pub elasticities: PathBuf,
}

impl ClusterFiles {
    pub fn in_dir(dir: &Path, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prices: dir.join(format!("{}{}", name, PRICES_SUFFIX)),
            elasticities: dir.join(format!("{}{}", name, ELASTICITIES_SUFFIX)),
            name,
        }
    }
}

fn read_records<T: DeserializeOwned, R: Read>(reader: R) -> csv::Result<Vec<T>> {
    csv::ReaderBuilder::new()
        .delimiter(DELIMITER)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
        .deserialize()
        .collect()
}

fn read_file<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, DataError> {
    let file = File::open(path).map_err(|source| DataError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_records(file).map_err(|source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

fn write_records<T: Serialize, W: Write>(writer: W, records: impl IntoIterator<Item = T>) -> csv::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(DELIMITER)
        .from_writer(writer);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn write_file<T: Serialize>(path: &Path, records: impl IntoIterator<Item = T>) -> Result<(), DataError> {
    let file = File::create(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_records(file, records).map_err(|source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// `product;price;margin_of_sales` records
pub fn read_price_options<R: Read>(reader: R) -> csv::Result<Vec<PriceOption>> {
    read_records(reader)
}

/// `product_A;affected_product_B;price_A;affected_margin_B` records
pub fn read_cross_elasticities<R: Read>(reader: R) -> csv::Result<Vec<CrossElasticityEdge>> {
    read_records(reader)
}

pub fn load_dataset(prices: &Path, elasticities: &Path) -> Result<PricingData, DataError> {
    let options: Vec<PriceOption> = read_file(prices)?;
    let edges: Vec<CrossElasticityEdge> = read_file(elasticities)?;
    let data = PricingData::new(options, edges);

    let summary = data.summary();
    info!(
        prices = %prices.display(),
        products = summary.num_products,
        max_prices = summary.max_prices,
        min_prices = summary.min_prices,
        avg_prices = summary.avg_prices,
        avg_margin = summary.avg_margin,
        elasticities = summary.num_elasticities,
        avg_elasticity = summary.avg_elasticity,
        "Loaded dataset"
    );
    Ok(data)
}

pub fn write_dataset(files: &ClusterFiles, data: &PricingData) -> Result<(), DataError> {
    write_file(&files.prices, data.price_options())?;
    write_file(&files.elasticities, data.elasticities())?;
    debug!(cluster = %files.name, options = data.num_price_options(), "Wrote cluster files");
    Ok(())
}

/// Write each cluster as `{prefix}_subgraph{N}_*` files, `N` counting from 1
pub fn write_cluster_files(
    dir: &Path,
    prefix: &str,
    problems: &[ClusterProblem],
) -> Result<Vec<ClusterFiles>, DataError> {
    fs::create_dir_all(dir).map_err(|source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(problems.len());
    for problem in problems {
        let files = ClusterFiles::in_dir(dir, format!("{}_subgraph{}", prefix, problem.index + 1));
        write_dataset(&files, &problem.data)?;
        written.push(files);
    }

    info!(dir = %dir.display(), clusters = written.len(), "Wrote cluster files");
    Ok(written)
}

/// Cluster file pairs in `dir`, sorted by name
pub fn discover_cluster_files(dir: &Path) -> Result<Vec<ClusterFiles>, DataError> {
    let io_error = |source| DataError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str().and_then(|n| n.strip_suffix(ELASTICITIES_SUFFIX)) else {
            continue;
        };

        let files = ClusterFiles::in_dir(dir, name);
        if !files.prices.is_file() {
            return Err(DataError::MissingPriceFile {
                prefix: files.name,
                path: files.prices,
            });
        }
        found.push(files);
    }

    found.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(found)
}

pub fn load_cluster_problems(files: &[ClusterFiles]) -> Result<Vec<ClusterProblem>, DataError> {
    files
        .iter()
        .enumerate()
        .map(|(index, f)| {
            let data = load_dataset(&f.prices, &f.elasticities)?;
            Ok(ClusterProblem::new(index, f.name.clone(), data))
        })
        .collect()
}

#[derive(Debug, Serialize)]
struct SolutionRow {
    product: u32,
    price: String,
}

/// `product;price` rows ordered by product, `-1` for unassigned
pub fn write_solution<W: Write>(writer: W, solution: &GlobalSolution) -> csv::Result<()> {
    write_records(
        writer,
        solution.iter().map(|(product, selection)| SolutionRow {
            product,
            price: selection.to_string(),
        }),
    )
}

pub fn write_solution_file(path: &Path, solution: &GlobalSolution) -> Result<(), DataError> {
    let file = File::create(path).map_err(|source| DataError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    write_solution(file, solution).map_err(|source| DataError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), products = solution.len(), "Wrote solution");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PriceSelection;
    use std::collections::BTreeMap;

    #[test]
    fn test_reads_semicolon_records() {
        let prices = "product;price;margin_of_sales\n1;1;100.5\n1;2; 150\n";
        let options = read_price_options(prices.as_bytes()).unwrap();
        assert_eq!(
            options,
            vec![PriceOption::new(1, 1, 100.5), PriceOption::new(1, 2, 150.0)]
        );

        let edges = "product_A;affected_product_B;price_A;affected_margin_B\n1;2;2;-10.25\n";
        let edges = read_cross_elasticities(edges.as_bytes()).unwrap();
        assert_eq!(edges, vec![CrossElasticityEdge::new(1, 2, 2, -10.25)]);
    }

    #[test]
    fn test_malformed_record_is_an_error() {
        let prices = "product;price;margin_of_sales\n1;x;100\n";
        assert!(read_price_options(prices.as_bytes()).is_err());
    }

    #[test]
    fn test_cluster_files_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let data = PricingData::new(
            vec![
                PriceOption::new(1, 1, 100.123456789),
                PriceOption::new(2, 1, 0.1 + 0.2),
            ],
            vec![CrossElasticityEdge::new(1, 2, 1, 3.3333333333)],
        );
        let problems = vec![ClusterProblem::new(0, "subgraph1", data.clone())];

        let written = write_cluster_files(dir.path(), "cluster", &problems).unwrap();
        assert_eq!(written[0].name, "cluster_subgraph1");
        assert!(dir.path().join("cluster_subgraph1_elasticity_prices.csv").is_file());

        let discovered = discover_cluster_files(dir.path()).unwrap();
        assert_eq!(discovered, written);

        let loaded = load_cluster_problems(&discovered).unwrap();
        assert_eq!(*loaded[0].data, data);
    }

    #[test]
    fn test_missing_price_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("x_subgraph1_cross_elasticity_prices.csv"),
            "product_A;affected_product_B;price_A;affected_margin_B\n",
        )
        .unwrap();
        assert!(matches!(
            discover_cluster_files(dir.path()),
            Err(DataError::MissingPriceFile { .. })
        ));
    }

    #[test]
    fn test_solution_format() {
        let solution = GlobalSolution::new(BTreeMap::from([
            (2, PriceSelection::Unassigned),
            (1, PriceSelection::Selected(vec![3])),
            (3, PriceSelection::Selected(vec![1, 2])),
        ]));
        let mut out = Vec::new();
        write_solution(&mut out, &solution).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "product;price\n1;3\n2;-1\n3;1,2\n"
        );
    }
}
