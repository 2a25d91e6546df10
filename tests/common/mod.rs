// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use ledger_mirror::db;
use ledger_mirror::db::models::Profile;
use ledger_mirror::transport::{
    Connection, FormResponse, ResponseBody, TemporaryAuth, Transport, TransportError,
};
use std::collections::{HashMap, VecDeque};
use std::io::{self, Cursor, Read};
use std::sync::Mutex;
use tempfile::TempDir;

/// One request seen by [`FakeTransport`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Get(String),
    Put { path: String, body: String },
    Post {
        path: String,
        fields: Vec<(String, String)>,
        cookies: Vec<(String, String)>,
    },
}

/// Canned answer to a GET
#[derive(Debug, Clone)]
enum CannedGet {
    Body(String),
    /// Sends the prefix, then the connection drops
    CutOff(String),
    Error(TransportError),
}

/// Body that fails with a connection reset once `data` is used up
pub struct CutOffReader {
    data: Cursor<Vec<u8>>,
}

impl CutOffReader {
    pub fn new(prefix: &str) -> Self {
        Self {
            data: Cursor::new(prefix.as_bytes().to_vec()),
        }
    }
}

impl Read for CutOffReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::ConnectionReset, "connection reset by peer")),
            n => Ok(n),
        }
    }
}

/// In-memory server with canned responses per path
///
/// Paths without a canned GET response answer 404.
#[derive(Default)]
pub struct FakeTransport {
    gets: Mutex<HashMap<String, CannedGet>>,
    puts: Mutex<HashMap<String, VecDeque<Result<(), TransportError>>>>,
    posts: Mutex<VecDeque<Result<FormResponse, TransportError>>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_get(self, path: &str, body: &str) -> Self {
        self.gets
            .lock()
            .unwrap()
            .insert(path.to_string(), CannedGet::Body(body.to_string()));
        self
    }

    /// Answer `path` with `prefix`, then drop the connection mid-body
    pub fn with_get_cut_off(self, path: &str, prefix: &str) -> Self {
        self.gets
            .lock()
            .unwrap()
            .insert(path.to_string(), CannedGet::CutOff(prefix.to_string()));
        self
    }

    pub fn with_get_error(self, path: &str, err: TransportError) -> Self {
        self.gets
            .lock()
            .unwrap()
            .insert(path.to_string(), CannedGet::Error(err));
        self
    }

    /// Queue the outcome of the next PUT to `path`; unqueued PUTs succeed
    pub fn with_put(self, path: &str, result: Result<(), TransportError>) -> Self {
        self.puts
            .lock()
            .unwrap()
            .entry(path.to_string())
            .or_default()
            .push_back(result);
        self
    }

    /// Queue the response to the next form POST
    pub fn with_post(self, status: u16, body: &str, cookies: &[(&str, &str)]) -> Self {
        self.posts.lock().unwrap().push_back(Ok(FormResponse {
            status,
            body: body.to_string(),
            cookies: cookies
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        }));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn get_paths(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Get(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for FakeTransport {
    fn get(
        &self,
        _conn: &Connection,
        path: &str,
        _auth: Option<&TemporaryAuth>,
    ) -> Result<ResponseBody, TransportError> {
        self.record(Call::Get(path.to_string()));
        match self.gets.lock().unwrap().get(path) {
            Some(CannedGet::Body(body)) => Ok(Box::new(Cursor::new(body.clone().into_bytes()))),
            Some(CannedGet::CutOff(prefix)) => Ok(Box::new(CutOffReader::new(prefix))),
            Some(CannedGet::Error(e)) => Err(e.clone()),
            None => Err(TransportError::NotFound(path.to_string())),
        }
    }

    fn put_json(
        &self,
        _conn: &Connection,
        path: &str,
        body: &[u8],
        _auth: Option<&TemporaryAuth>,
    ) -> Result<(), TransportError> {
        self.record(Call::Put {
            path: path.to_string(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
        self.puts
            .lock()
            .unwrap()
            .get_mut(path)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(()))
    }

    fn post_form(
        &self,
        _conn: &Connection,
        path: &str,
        fields: &[(String, String)],
        cookies: &[(String, String)],
        _auth: Option<&TemporaryAuth>,
    ) -> Result<FormResponse, TransportError> {
        self.record(Call::Post {
            path: path.to_string(),
            fields: fields.to_vec(),
            cookies: cookies.to_vec(),
        });
        self.posts.lock().unwrap().pop_front().unwrap_or_else(|| {
            Err(TransportError::Http {
                status: 500,
                message: "no canned form response".to_string(),
            })
        })
    }
}

/// Create a migrated database in a temp dir.
///
/// Returns (TempDir, Connection) - keep the TempDir alive to prevent cleanup.
pub fn setup_test_db() -> (TempDir, rusqlite::Connection) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir.path().join("mirror.db");
    db::init(&db_path).unwrap();
    let conn = db::open(&db_path).unwrap();
    (temp_dir, conn)
}

/// Insert a profile pointing at a fake server
pub fn create_profile(conn: &rusqlite::Connection, name: &str) -> Profile {
    let mut profile = Profile::new(name.to_string(), "http://ledger.test/".to_string());
    profile.insert(conn).unwrap();
    profile
}

/// Account list in the shape newer JSON servers return
pub fn accounts_json() -> String {
    serde_json::json!([
        {
            "aname": "Assets",
            "anumpostings": 0,
            "aibalance": [amount_json("EUR", -1250, 2)]
        },
        {
            "aname": "Assets:Cash",
            "anumpostings": 1,
            "aibalance": [amount_json("EUR", -1250, 2)]
        },
        {
            "aname": "Expenses",
            "anumpostings": 0,
            "adata": {
                "pdperiods": [["2024-01-01", {
                    "bdincludingsubs": [amount_json("EUR", 1250, 2)],
                    "bdexcludingsubs": [],
                    "bdnumpostings": 0
                }]]
            }
        },
        {
            "aname": "Expenses:Food",
            "anumpostings": 1,
            "aibalance": [amount_json("EUR", 1250, 2)]
        }
    ])
    .to_string()
}

/// Transaction list with one grocery purchase
pub fn transactions_json() -> String {
    serde_json::json!([
        {
            "tindex": 1,
            "tdate": "2024-03-01",
            "tdescription": "Groceries",
            "tcomment": "",
            "tpostings": [
                posting_json("Expenses:Food", 1250),
                posting_json("Assets:Cash", -1250)
            ]
        }
    ])
    .to_string()
}

fn amount_json(commodity: &str, mantissa: i64, places: u32) -> serde_json::Value {
    serde_json::json!({
        "acommodity": commodity,
        "aquantity": {
            "decimalMantissa": mantissa,
            "decimalPlaces": places,
            "floatingPoint": mantissa as f64 / 10f64.powi(places as i32)
        },
        "aismultiplier": false
    })
}

fn posting_json(account: &str, mantissa: i64) -> serde_json::Value {
    serde_json::json!({
        "paccount": account,
        "pamount": [amount_json("EUR", mantissa, 2)],
        "ptransaction_": "1"
    })
}

/// What the journal page of a server with a JSON API looks like to the scanner
pub const MODERN_JOURNAL_HTML: &str = "<html><body><div id=\"app\">hledger-web</div></body></html>\n";

/// Journal page of a server without a JSON API
pub fn journal_html() -> String {
    concat!(
        "<html><body>\n",
        "<a href=\"/register?q=inacct%3AAssets%3ACash\">Cash</a>\n",
        "<span class=\"negative amount\">-12.50 EUR</span>\n",
        "<a href=\"/register?q=inacct%3AExpenses%3AFood\">Food</a>\n",
        "<span class=\"positive amount\">12.50 EUR</span>\n",
        "<h2>General Journal</h2>\n",
        "<tr class=\"title\" id=\"transaction-1\"><td class=\"date\">2024-03-01</td>\n",
        "<tr class=\"posting\" title=\"2024-03-01 Groceries\n",
        "    Expenses:Food    12.50 EUR\n",
        "    Assets:Cash    -12.50 EUR\n",
        "\n",
        "<div id=\"addmodal\">\n",
        "</body></html>\n",
    )
    .to_string()
}

/// Journal page with `count` one-euro purchases
pub fn large_journal_html(count: usize) -> String {
    let mut html = format!(
        concat!(
            "<html><body>\n",
            "<a href=\"/register?q=inacct%3AAssets%3ACash\">Cash</a>\n",
            "<span class=\"negative amount\">-{count}.00 EUR</span>\n",
            "<a href=\"/register?q=inacct%3AExpenses%3AFood\">Food</a>\n",
            "<span class=\"positive amount\">{count}.00 EUR</span>\n",
            "<h2>General Journal</h2>\n",
        ),
        count = count
    );
    for id in 1..=count {
        html.push_str(&format!(
            concat!(
                "<tr class=\"title\" id=\"transaction-{id}\"><td class=\"date\">2024-03-01</td>\n",
                "<tr class=\"posting\" title=\"2024-03-01 Purchase {id}\n",
                "    Expenses:Food    1.00 EUR\n",
                "    Assets:Cash    -1.00 EUR\n",
                "\n",
            ),
            id = id
        ));
    }
    html.push_str("<div id=\"addmodal\">\n</body></html>\n");
    html
}
