mod common;

use container::{ContainerResult, Factory, ServiceLocator};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Barrier,
    },
    thread,
    time::Duration,
};

struct Slow {
    serial: usize,
}

const THREADS: usize = 8;

#[test]
fn test_shared_service_is_constructed_once_under_contention() -> ContainerResult<()> {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = constructions.clone();

    let mut builder = common::builder()?;
    builder
        .register("slow", None)?
        .set_factory(Factory::closure(move |_| {
            thread::sleep(Duration::from_millis(20));
            Ok(Slow {
                serial: counter.fetch_add(1, Ordering::SeqCst),
            })
        }));
    builder.compile()?;

    let barrier = Barrier::new(THREADS);
    let results: Vec<ContainerResult<Arc<Slow>>> = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    builder.get_typed::<Slow>("slow")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect()
    });

    let services = results.into_iter().collect::<ContainerResult<Vec<_>>>()?;
    assert_eq!(constructions.load(Ordering::SeqCst), 1);
    assert!(services.iter().all(|s| Arc::ptr_eq(s, &services[0])));
    assert_eq!(services[0].serial, 0);
    Ok(())
}

#[test]
fn test_non_shared_service_is_constructed_per_request() -> ContainerResult<()> {
    let constructions = Arc::new(AtomicUsize::new(0));
    let counter = constructions.clone();

    let mut builder = common::builder()?;
    builder
        .register("fresh", None)?
        .set_factory(Factory::closure(move |_| {
            Ok(Slow {
                serial: counter.fetch_add(1, Ordering::SeqCst),
            })
        }))
        .set_shared(false);
    builder.compile()?;

    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| builder.get("fresh").map(|_| ()));
        }
    });

    assert_eq!(constructions.load(Ordering::SeqCst), THREADS);
    assert!(!builder.container().is_cached("fresh"));
    Ok(())
}

#[test]
fn test_concurrent_graph_of_shared_services() -> ContainerResult<()> {
    let mut builder = common::builder()?;
    builder.set_parameter("dsn", "smtp://localhost")?;
    builder
        .register("transport", Some("Transport"))?
        .add_argument("%dsn%");
    builder
        .register("mailer", Some("Mailer"))?
        .add_argument(container::Argument::reference("transport"));
    builder.compile()?;

    let barrier = Barrier::new(THREADS);
    let mailers = thread::scope(|scope| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                scope.spawn(|| {
                    barrier.wait();
                    builder.get_typed::<common::Mailer>("mailer")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect::<ContainerResult<Vec<_>>>()
    })?;

    assert!(mailers.iter().all(|m| Arc::ptr_eq(m, &mailers[0])));
    assert_eq!(mailers[0].transport.dsn, "smtp://localhost");
    assert_eq!(builder.stats().constructions, 2);
    Ok(())
}
