//! MAST archive access for mission light curves.
//!
//! Talks to the MAST portal API (`/api/v0/invoke`) with blocking HTTP:
//!
//! 1. resolve the target: `TIC <id>` names are matched directly against the
//!    CAOM `target_name`, anything else goes through `Mast.Name.Lookup` and a
//!    small cone search around the resolved position
//! 2. list time-series observations for the mission (and optional author)
//! 3. list their data products and keep the light curve files (`LC`)
//! 4. download each file into a cache directory
//!
//! Downloaded sectors are read and stitched into a single normalised curve.

use crate::io::read_fits;
use crate::{LightCurve, LightCurveError, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const MAST_API_URL: &str = "https://mast.stsci.edu/api/v0/invoke";
pub const MAST_DOWNLOAD_URL: &str = "https://mast.stsci.edu/api/v0.1/Download/file";

/// Cone radius used when searching by resolved coordinates (degrees)
pub const SEARCH_RADIUS_DEG: f64 = 0.0001;

/// Default download cache: `~/.cache/transit/mast`
pub fn default_cache_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".cache").join("transit").join("mast")
}

fn file_exists_and_not_empty<P: AsRef<Path>>(path: P) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.is_file() && metadata.len() > 0,
        Err(_) => false,
    }
}

/// MAST returns ids as numbers in some services and strings in others.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

/// One CAOM observation row.
#[derive(Debug, Clone, Deserialize)]
pub struct Observation {
    #[serde(deserialize_with = "string_or_number")]
    pub obsid: String,
    #[serde(default)]
    pub target_name: Option<String>,
    #[serde(default)]
    pub obs_collection: Option<String>,
    #[serde(default)]
    pub provenance_name: Option<String>,
    /// Sector number for TESS
    #[serde(default)]
    pub sequence_number: Option<i64>,
    #[serde(default)]
    pub t_exptime: Option<f64>,
}

/// One data product row.
#[derive(Debug, Clone, Deserialize)]
pub struct Product {
    #[serde(rename = "obsID", deserialize_with = "string_or_number")]
    pub obs_id: String,
    #[serde(rename = "productFilename")]
    pub filename: String,
    #[serde(rename = "dataURI")]
    pub data_uri: String,
    #[serde(rename = "productSubGroupDescription", default)]
    pub subgroup: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl Product {
    /// Light curve products carry the `LC` subgroup.
    pub fn is_lightcurve(&self) -> bool {
        self.subgroup.as_deref() == Some("LC")
    }
}

/// A downloadable light curve file together with its observation.
#[derive(Debug, Clone)]
pub struct SearchEntry {
    pub observation: Observation,
    pub product: Product,
}

/// Light curve files found for a target, ordered by sector.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub target: String,
    pub entries: Vec<SearchEntry>,
}

impl SearchResult {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only the first `n` entries.
    pub fn limit(mut self, n: usize) -> Self {
        info!("Limiting download to first {n} search results");
        self.entries.truncate(n);
        self
    }
}

#[derive(Debug, Deserialize)]
struct TableResponse<T> {
    #[serde(default)]
    status: Option<String>,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ResolvedCoordinate {
    ra: f64,
    decl: f64,
}

#[derive(Debug, Deserialize)]
struct NameLookupResponse {
    #[serde(rename = "resolvedCoordinate", default)]
    resolved: Vec<ResolvedCoordinate>,
}

/// Parse a `Mast.Name.Lookup` response into (ra, dec) degrees.
pub fn parse_name_lookup(body: &str, target: &str) -> Result<(f64, f64)> {
    let response: NameLookupResponse = serde_json::from_str(body)?;
    response
        .resolved
        .first()
        .map(|c| (c.ra, c.decl))
        .ok_or_else(|| LightCurveError::NoResults(target.to_string()))
}

fn parse_table<T: for<'de> Deserialize<'de>>(body: &str) -> Result<Vec<T>> {
    let response: TableResponse<T> = serde_json::from_str(body)?;
    if let Some(status) = response.status.as_deref() {
        if status == "ERROR" {
            return Err(LightCurveError::Archive(format!(
                "MAST request failed: {body}"
            )));
        }
    }
    Ok(response.data)
}

/// Parse a CAOM observation table.
pub fn parse_observations(body: &str) -> Result<Vec<Observation>> {
    parse_table(body)
}

/// Parse a `Mast.Caom.Products` table.
pub fn parse_products(body: &str) -> Result<Vec<Product>> {
    parse_table(body)
}

/// Numeric TIC identifier if `target` is written as `TIC <id>`.
pub fn tic_id(target: &str) -> Option<String> {
    let trimmed = target.trim();
    let rest = trimmed
        .strip_prefix("TIC")
        .or_else(|| trimmed.strip_prefix("tic"))?;
    let id = rest.trim_start_matches([' ', '-', '_']).trim();
    if !id.is_empty() && id.chars().all(|c| c.is_ascii_digit()) {
        Some(id.trim_start_matches('0').to_string())
    } else {
        None
    }
}

/// Pair products with their observations, keep light curves, order by sector.
pub fn match_products(observations: &[Observation], products: Vec<Product>) -> Vec<SearchEntry> {
    let mut entries: Vec<SearchEntry> = products
        .into_iter()
        .filter(Product::is_lightcurve)
        .filter_map(|product| {
            observations
                .iter()
                .find(|o| o.obsid == product.obs_id)
                .map(|observation| SearchEntry {
                    observation: observation.clone(),
                    product,
                })
        })
        .collect();
    entries.sort_by_key(|e| (e.observation.sequence_number.unwrap_or(i64::MAX), e.product.filename.clone()));
    entries
}

/// Blocking MAST portal client.
#[derive(Debug, Clone)]
pub struct MastClient {
    client: reqwest::blocking::Client,
    api_url: String,
    download_url: String,
}

impl MastClient {
    /// Client against the public MAST endpoints with a 30 s timeout.
    pub fn new() -> Result<Self> {
        Self::with_urls(MAST_API_URL, MAST_DOWNLOAD_URL, Duration::from_secs(30))
    }

    /// Client against custom endpoints (mirrors, test servers).
    pub fn with_urls(api_url: &str, download_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            api_url: api_url.to_string(),
            download_url: download_url.to_string(),
        })
    }

    fn invoke(&self, request: &Value) -> Result<String> {
        debug!("MAST request: {request}");
        let response = self
            .client
            .post(&self.api_url)
            .form(&[("request", request.to_string())])
            .send()?;
        if !response.status().is_success() {
            return Err(LightCurveError::Archive(format!(
                "MAST returned status {}",
                response.status()
            )));
        }
        Ok(response.text()?)
    }

    /// Resolve an object name to (ra, dec) in degrees.
    pub fn resolve(&self, target: &str) -> Result<(f64, f64)> {
        let body = self.invoke(&json!({
            "service": "Mast.Name.Lookup",
            "format": "json",
            "params": { "input": target, "format": "json" },
        }))?;
        parse_name_lookup(&body, target)
    }

    fn observation_filters(mission: &str, author: Option<&str>) -> Vec<Value> {
        let mut filters = vec![
            json!({ "paramName": "obs_collection", "values": [mission] }),
            json!({ "paramName": "dataproduct_type", "values": ["timeseries"] }),
        ];
        if let Some(author) = author {
            filters.push(json!({ "paramName": "provenance_name", "values": [author] }));
        }
        filters
    }

    /// Time-series observations of `target` for `mission`.
    pub fn observations(
        &self,
        target: &str,
        mission: &str,
        author: Option<&str>,
    ) -> Result<Vec<Observation>> {
        let mut filters = Self::observation_filters(mission, author);
        let request = match tic_id(target) {
            Some(id) => {
                filters.push(json!({ "paramName": "target_name", "values": [id] }));
                json!({
                    "service": "Mast.Caom.Filtered",
                    "format": "json",
                    "params": { "columns": "*", "filters": filters },
                })
            }
            None => {
                let (ra, dec) = self.resolve(target)?;
                debug!("Resolved {target} to ra={ra:.5} dec={dec:.5}");
                json!({
                    "service": "Mast.Caom.Filtered.Position",
                    "format": "json",
                    "params": {
                        "columns": "*",
                        "filters": filters,
                        "position": format!("{ra}, {dec}, {SEARCH_RADIUS_DEG}"),
                    },
                })
            }
        };
        parse_observations(&self.invoke(&request)?)
    }

    /// Data products attached to the given observations.
    pub fn products(&self, observations: &[Observation]) -> Result<Vec<Product>> {
        if observations.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<&str> = observations.iter().map(|o| o.obsid.as_str()).collect();
        let body = self.invoke(&json!({
            "service": "Mast.Caom.Products",
            "format": "json",
            "params": { "obsid": ids.join(",") },
        }))?;
        parse_products(&body)
    }

    /// Search for light curve files of `target`.
    pub fn search_lightcurve(
        &self,
        target: &str,
        mission: &str,
        author: Option<&str>,
    ) -> Result<SearchResult> {
        info!("Searching for target: {target} (mission={mission})");
        let observations = self.observations(target, mission, author)?;
        let products = self.products(&observations)?;
        let entries = match_products(&observations, products);
        info!("Found {} results", entries.len());
        if entries.is_empty() {
            return Err(LightCurveError::NoResults(target.to_string()));
        }
        Ok(SearchResult {
            target: target.to_string(),
            entries,
        })
    }

    fn download_file(&self, data_uri: &str, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        // write to a temporary file first so interrupted downloads are never reused
        let temp_path = path.with_extension("tmp");

        let mut response = self
            .client
            .get(&self.download_url)
            .query(&[("uri", data_uri)])
            .send()?;
        if !response.status().is_success() {
            return Err(LightCurveError::Archive(format!(
                "Failed to download {data_uri}, status: {}",
                response.status()
            )));
        }

        let mut file = BufWriter::new(File::create(&temp_path)?);

        let written = io::copy(&mut response, &mut file).and_then(|_| file.flush());
        drop(file);
        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        fs::rename(temp_path, path)?;
        Ok(())
    }

    /// Download every entry into `dir`, reusing files already present.
    pub fn download_all<P: AsRef<Path>>(
        &self,
        result: &SearchResult,
        dir: P,
    ) -> Result<Vec<PathBuf>> {
        info!("Downloading lightcurves (this may take time depending on network)");
        let mut paths = Vec::with_capacity(result.len());
        for entry in &result.entries {
            let path = dir.as_ref().join(&entry.product.filename);
            if file_exists_and_not_empty(&path) {
                debug!("Using cached {}", path.display());
            } else {
                info!("Downloading {}", entry.product.filename);
                self.download_file(&entry.product.data_uri, &path)?;
            }
            paths.push(path);
        }
        Ok(paths)
    }
}

/// Combine sectors into one curve.
///
/// Each curve is normalised by its own median before concatenation so that
/// sector-to-sector offsets disappear; the result is sorted by time. If any
/// curve cannot be normalised the curves are appended unchanged instead.
pub fn stitch(curves: &[LightCurve]) -> Result<LightCurve> {
    let (first, rest) = curves.split_first().ok_or_else(|| {
        LightCurveError::Archive("download returned no light curves".to_string())
    })?;

    info!("Stitching lightcurves into a single LightCurve");
    let normalized: Result<Vec<LightCurve>> = curves.iter().map(LightCurve::normalize).collect();
    let stitched = match normalized {
        Ok(parts) => parts
            .iter()
            .skip(1)
            .fold(parts[0].clone(), |acc, lc| acc.append(lc)),
        Err(e) => {
            warn!("Stitch failed ({e}); trying manual append");
            rest.iter().fold(first.clone(), |acc, lc| acc.append(lc))
        }
    };
    Ok(stitched.sort_by_time())
}

/// Search, download and stitch all light curves of `target`.
///
/// MAST serves light curves as FITS files, so this needs the `fits` feature;
/// without it the call fails before any network request is made.
///
/// # Arguments
/// * `client` - MAST client used for the search and the downloads
/// * `target` - Target name, either `TIC <id>` or a resolvable star name
/// * `mission` - Observation collection, usually `TESS`
/// * `author` - Optional pipeline filter such as `SPOC`
/// * `limit` - Keep only the first `n` products (`None` or `0` keeps all)
/// * `dir` - Download cache; files already there are reused
///
/// # Returns
/// * `Ok(LightCurve)` - Sectors normalised, concatenated and sorted by time
/// * `Err(FeatureDisabled)` - Built without the `fits` feature
/// * `Err(NoResults)` - The archive has no light curves for `target`
pub fn search_and_download<P: AsRef<Path>>(
    client: &MastClient,
    target: &str,
    mission: &str,
    author: Option<&str>,
    limit: Option<usize>,
    dir: P,
) -> Result<LightCurve> {
    if !cfg!(feature = "fits") {
        return Err(LightCurveError::FeatureDisabled("FITS", "fits"));
    }
    let mut result = client.search_lightcurve(target, mission, author)?;
    if let Some(n) = limit.filter(|&n| n > 0) {
        result = result.limit(n);
    }

    let paths = client.download_all(&result, dir)?;
    let curves = paths
        .iter()
        .map(read_fits)
        .collect::<Result<Vec<_>>>()?;

    let mut lc = stitch(&curves)?;
    lc.meta.target = Some(target.to_string());
    lc.meta.mission = Some(mission.to_string());
    Ok(lc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const OBSERVATIONS: &str = r#"{
        "status": "COMPLETE",
        "data": [
            {"obsid": 27001088, "target_name": "25155310", "obs_collection": "TESS",
             "provenance_name": "SPOC", "sequence_number": 3, "t_exptime": 120.0},
            {"obsid": "27000020", "target_name": "25155310", "obs_collection": "TESS",
             "provenance_name": "SPOC", "sequence_number": 1, "t_exptime": 120.0}
        ]
    }"#;

    const PRODUCTS: &str = r#"{
        "status": "COMPLETE",
        "data": [
            {"obsID": "27001088", "productFilename": "tess-s0003_lc.fits",
             "dataURI": "mast:TESS/product/tess-s0003_lc.fits", "productSubGroupDescription": "LC"},
            {"obsID": "27001088", "productFilename": "tess-s0003_tp.fits",
             "dataURI": "mast:TESS/product/tess-s0003_tp.fits", "productSubGroupDescription": "TP"},
            {"obsID": 27000020, "productFilename": "tess-s0001_lc.fits",
             "dataURI": "mast:TESS/product/tess-s0001_lc.fits", "productSubGroupDescription": "LC"}
        ]
    }"#;

    #[test]
    fn test_tic_id() {
        assert_eq!(tic_id("TIC 25155310").as_deref(), Some("25155310"));
        assert_eq!(tic_id("tic-0025155310").as_deref(), Some("25155310"));
        assert_eq!(tic_id("WASP-121"), None);
        assert_eq!(tic_id("TIC"), None);
    }

    #[test]
    fn test_parse_and_match_products() {
        let observations = parse_observations(OBSERVATIONS).unwrap();
        assert_eq!(observations[0].obsid, "27001088");
        let products = parse_products(PRODUCTS).unwrap();
        assert_eq!(products.len(), 3);

        let entries = match_products(&observations, products);
        assert_eq!(entries.len(), 2);
        // ordered by sector
        assert_eq!(entries[0].product.filename, "tess-s0001_lc.fits");
        assert_eq!(entries[1].observation.sequence_number, Some(3));

        let result = SearchResult {
            target: "TIC 25155310".to_string(),
            entries,
        }
        .limit(1);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_parse_error_status() {
        let err = parse_observations(r#"{"status": "ERROR", "msg": "bad"}"#).unwrap_err();
        assert!(matches!(err, LightCurveError::Archive(_)));
    }

    #[test]
    fn test_parse_name_lookup() {
        let body = r#"{"resolvedCoordinate": [{"ra": 107.6, "decl": -39.1, "canonicalName": "WASP-121"}], "status": ""}"#;
        let (ra, dec) = parse_name_lookup(body, "WASP-121").unwrap();
        assert_relative_eq!(ra, 107.6);
        assert_relative_eq!(dec, -39.1);

        let empty = parse_name_lookup(r#"{"resolvedCoordinate": []}"#, "nothing").unwrap_err();
        assert_eq!(empty.to_string(), "No lightcurve results for nothing");
    }

    #[test]
    fn test_stitch_normalizes_each_sector() {
        let a = LightCurve::from_time_flux(vec![10.0, 11.0, 12.0], vec![200.0, 210.0, 190.0])
            .unwrap();
        let b = LightCurve::from_time_flux(vec![1.0, 2.0, 3.0], vec![50.0, 50.0, 55.0]).unwrap();
        let lc = stitch(&[a, b]).unwrap();
        assert_eq!(lc.time.to_vec(), vec![1.0, 2.0, 3.0, 10.0, 11.0, 12.0]);
        assert_relative_eq!(lc.flux[0], 1.0);
        assert_relative_eq!(lc.flux[2], 1.1);
        assert_relative_eq!(lc.flux[3], 1.0);
        assert_relative_eq!(lc.flux[5], 0.95);
    }

    #[test]
    fn test_stitch_falls_back_to_append() {
        let a = LightCurve::from_time_flux(vec![3.0, 4.0], vec![0.0, 0.0]).unwrap();
        let b = LightCurve::from_time_flux(vec![1.0, 2.0], vec![5.0, 6.0]).unwrap();
        let lc = stitch(&[a, b]).unwrap();
        assert_eq!(lc.flux.to_vec(), vec![5.0, 6.0, 0.0, 0.0]);
    }

    #[test]
    fn test_stitch_empty() {
        assert!(stitch(&[]).is_err());
    }

    #[cfg(not(feature = "fits"))]
    #[test]
    fn test_download_needs_fits_before_any_request() {
        // unroutable endpoints: reaching the network would surface an Http error instead
        let client = MastClient::with_urls(
            "http://127.0.0.1:9/invoke",
            "http://127.0.0.1:9/download",
            Duration::from_millis(50),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let err = search_and_download(&client, "TIC 25155310", "TESS", None, None, dir.path())
            .unwrap_err();
        assert!(matches!(err, LightCurveError::FeatureDisabled("FITS", "fits")));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_truncated_download_leaves_no_temp_file() {
        use std::io::{Read, Write as _};
        use std::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let _ = stream.read(&mut buf);
            // promise more bytes than are sent, then hang up
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 1000\r\n\r\nSIMPLE  =")
                .unwrap();
        });

        let client = MastClient::with_urls(
            &format!("http://{addr}/invoke"),
            &format!("http://{addr}/download"),
            Duration::from_secs(5),
        )
        .unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sector_lc.fits");
        assert!(client.download_file("mast:TESS/sector_lc.fits", &path).is_err());
        server.join().unwrap();

        assert!(!path.exists());
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_cache_dir() {
        let cache_dir = default_cache_dir();
        assert!(cache_dir.to_str().unwrap().contains(".cache/transit"));
    }
}
