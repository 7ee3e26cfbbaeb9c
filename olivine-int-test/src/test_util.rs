use olivine::doc;
use olivine::document::Document;
use olivine::errors::OlivineResult;
use olivine::keys::KeyKind;
use olivine::olivine::Olivine;
use olivine::registration::{CollectionRegistration, Entity, EntityRegistration, IndexSpec};
use std::backtrace::Backtrace;
use std::thread;
use std::time::{Duration, Instant};

/// Runs a test with retry logic and error handling.
/// Tests run on the current thread to avoid thread exhaustion when running many tests in parallel.
pub fn run_test<B, T, A>(before: B, test: T, after: A)
where
    B: Fn() -> OlivineResult<TestContext> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    T: Fn(TestContext) -> OlivineResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
    A: Fn(TestContext) -> OlivineResult<()> + std::panic::UnwindSafe + std::panic::RefUnwindSafe,
{
    const MAX_RETRIES: u32 = 3;
    let mut last_error: Option<String> = None;
    let mut last_backtrace: Option<String> = None;

    for attempt in 1..=MAX_RETRIES {
        let start_time = Instant::now();

        let result = std::panic::catch_unwind(|| {
            let backtrace = Backtrace::capture();
            match before() {
                Ok(ctx) => match test(ctx.clone()) {
                    Ok(_) => match after(ctx) {
                        Ok(_) => Ok(()),
                        Err(e) => Err((format!("After run failed: {:?}", e), backtrace.to_string())),
                    },
                    Err(e) => {
                        let _ = after(ctx);
                        Err((format!("Test failed: {:?}", e), backtrace.to_string()))
                    }
                },
                Err(e) => Err((format!("Before run failed: {:?}", e), backtrace.to_string())),
            }
        });

        let elapsed = start_time.elapsed();

        match result {
            Ok(Ok(_)) => return, // Test passed
            Ok(Err((e, bt))) => {
                last_error = Some(e.clone());
                last_backtrace = Some(bt);
                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Failed (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("Error: {}", e);
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
            Err(panic_err) => {
                let err_msg = if let Some(s) = panic_err.downcast_ref::<&str>() {
                    s.to_string()
                } else if let Some(s) = panic_err.downcast_ref::<String>() {
                    s.clone()
                } else {
                    format!("Unknown panic: {:?}", panic_err.type_id())
                };

                last_error = Some(format!("Panic: {}", err_msg));
                last_backtrace = Some(Backtrace::capture().to_string());

                if attempt < MAX_RETRIES {
                    eprintln!(
                        "\n========== Test Attempt {}/{} Panicked (took {:?}) ==========",
                        attempt, MAX_RETRIES, elapsed
                    );
                    eprintln!("{}", last_error.as_ref().unwrap());
                    eprintln!("Retrying in {}ms...\n", 100 * attempt);
                    thread::sleep(Duration::from_millis(100 * attempt as u64));
                }
            }
        }
    }

    // All retries exhausted - print full details
    eprintln!("\n==================== TEST FAILED ====================");
    eprintln!("Failed after {} attempts", MAX_RETRIES);
    eprintln!("Last error: {}", last_error.as_deref().unwrap_or("Unknown"));
    if let Some(bt) = &last_backtrace {
        if !bt.is_empty() && !bt.contains("disabled") {
            eprintln!("\nBacktrace:\n{}", bt);
        }
    }
    eprintln!("=====================================================\n");

    panic!(
        "Test failed after {} attempts. Last error: {}",
        MAX_RETRIES,
        last_error.unwrap_or_default()
    );
}

#[derive(Clone)]
pub struct TestContext {
    db: Olivine,
}

impl TestContext {
    pub fn new(db: Olivine) -> Self {
        Self { db }
    }

    pub fn db(&self) -> Olivine {
        self.db.clone()
    }
}

/// Opens a store with the shared test collections: typed `specimens`
/// (keyed by serial, optional `notes`), typed `analyses` (keyed by id),
/// and the schemaless `assays` collection.
pub fn create_test_context() -> OlivineResult<TestContext> {
    let db = Olivine::builder()
        .register(
            EntityRegistration::<Specimen>::new("specimens")
                .with_key("serial", KeyKind::I64)
                .with_index(IndexSpec::non_unique("mineral"))
                .with_optional_field("notes"),
        )
        .register(EntityRegistration::<Analysis>::new("analyses").with_key("id", KeyKind::I64))
        .register_collection(CollectionRegistration::new("assays"))
        .open()?;
    Ok(TestContext::new(db))
}

pub fn cleanup(ctx: TestContext) -> OlivineResult<()> {
    if !ctx.db().is_closed() {
        ctx.db().close()?;
    }
    Ok(())
}

#[derive(Clone, Debug, PartialEq)]
pub struct Specimen {
    pub serial: i64,
    pub mineral: String,
    pub locality: String,
    pub grade: f64,
    pub notes: Option<String>,
}

impl Specimen {
    pub fn new(serial: i64, mineral: &str, locality: &str, grade: f64) -> Self {
        Specimen {
            serial,
            mineral: mineral.to_string(),
            locality: locality.to_string(),
            grade,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: &str) -> Self {
        self.notes = Some(notes.to_string());
        self
    }
}

impl Entity for Specimen {
    fn to_document(&self) -> OlivineResult<Document> {
        let mut document = doc! {
            serial: (self.serial),
            mineral: (self.mineral.clone()),
            locality: (self.locality.clone()),
            grade: (self.grade)
        };
        if let Some(notes) = &self.notes {
            document.put("notes", notes.clone())?;
        }
        Ok(document)
    }

    fn from_document(document: &Document) -> OlivineResult<Self> {
        Ok(Specimen {
            serial: document.get("serial")?.as_i64().unwrap_or_default(),
            mineral: document
                .get("mineral")?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            locality: document
                .get("locality")?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            grade: document.get("grade")?.as_f64().unwrap_or_default(),
            notes: document.get("notes")?.as_str().map(str::to_string),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub id: i64,
    pub specimen_serial: i64,
    pub method: String,
    pub value: f64,
}

impl Analysis {
    pub fn new(specimen_serial: i64, method: &str, value: f64) -> Self {
        Analysis {
            id: 0,
            specimen_serial,
            method: method.to_string(),
            value,
        }
    }
}

impl Entity for Analysis {
    fn to_document(&self) -> OlivineResult<Document> {
        Ok(doc! {
            id: (self.id),
            specimen_serial: (self.specimen_serial),
            method: (self.method.clone()),
            value: (self.value)
        })
    }

    fn from_document(document: &Document) -> OlivineResult<Self> {
        Ok(Analysis {
            id: document.get("id")?.as_i64().unwrap_or_default(),
            specimen_serial: document
                .get("specimen_serial")?
                .as_i64()
                .unwrap_or_default(),
            method: document
                .get("method")?
                .as_str()
                .unwrap_or_default()
                .to_string(),
            value: document.get("value")?.as_f64().unwrap_or_default(),
        })
    }
}

/// Three fixed specimens with distinct serials, minerals, and grades.
pub fn sample_specimens() -> Vec<Specimen> {
    vec![
        Specimen::new(1, "olivine", "Zabargad", 9.5),
        Specimen::new(2, "quartz", "Minas Gerais", 7.0),
        Specimen::new(3, "biotite", "Bancroft", 5.5),
    ]
}

pub fn insert_sample_specimens(db: &Olivine) -> OlivineResult<Vec<Specimen>> {
    let specimens = sample_specimens();
    db.insert_all(&specimens)?;
    Ok(specimens)
}
