use std::rc::Rc;

use portage_package::{
    match_from_list, Atom, CacheEntry, MetadataKey, Package, PackageOptions, PackageType,
    RootConfig, Settings,
};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const EXAMPLE: &str = "\
DEFINED_PHASES=install test unpack
DEPEND=>=sys-devel/clang-10.0.0_rc1:* dev-python/setuptools
DESCRIPTION=Python bindings for sys-devel/clang
EAPI=7
HOMEPAGE=https://llvm.org/
IUSE=test python_targets_python3_6 python_targets_python3_7
KEYWORDS=~amd64 ~x86
LICENSE=Apache-2.0-with-LLVM-exceptions UoI-NCSA
RDEPEND=>=sys-devel/clang-10.0.0_rc1:* test? ( dev-python/pytest )
REQUIRED_USE=|| ( python_targets_python3_6 python_targets_python3_7 )
RESTRICT=!test? ( test )
SLOT=0
SRC_URI=https://github.com/llvm/llvm-project/archive/llvmorg-10.0.0-rc1.tar.gz
_eclasses_=llvm.org\t4e92abc123\tmultibuild\t40fe456789
_md5_=4539d849d3cea8ac84debad9b3154143
";

fn main() {
    // RUST_LOG=portage_package=debug shows why packages are masked.
    tracing_subscriber::registry()
        .with(fmt::layer().compact())
        .with(EnvFilter::from_default_env())
        .init();

    let entry = CacheEntry::parse(EXAMPLE).expect("failed to parse cache entry");

    let settings = Settings {
        accept_keywords: vec!["amd64".into()],
        use_flags: vec!["python_targets_python3_7".into()],
        ..Settings::default()
    };
    let root = RootConfig::new("/", settings);

    let pkg = Rc::new(
        Package::new(
            "dev-python/clang-python-10.0.0_rc1",
            PackageType::Ebuild,
            PackageOptions::default(),
            entry.metadata,
            Rc::clone(&root),
        )
        .expect("invalid cpv"),
    );

    println!("=== Package ===");
    println!("{pkg}");
    println!("EAPI:         {}", pkg.eapi());
    println!("Inherited:    {}", join(pkg.inherited()));
    println!("USE:          {}", pkg.metadata(MetadataKey::Use));
    println!("RESTRICT:     {}", pkg.metadata(MetadataKey::Restrict));
    println!(
        "Phases:       {}",
        join(pkg.defined_phases().iter().map(|p| p.name()))
    );
    println!(
        "Atoms:        {}",
        join(pkg.validated_atoms().iter().map(|a| a.to_string()))
    );

    match pkg.invalid() {
        Some(invalid) => {
            println!("Invalid:");
            for (category, messages) in invalid {
                for message in messages {
                    println!("  {category}: {message}");
                }
            }
        }
        None => println!("Invalid:      no"),
    }
    match pkg.masks() {
        Some(masks) => println!("Masks:        {masks:?}"),
        None => println!("Masks:        none"),
    }
    println!("Visible:      {}", pkg.visible());

    println!("\n=== With USE=test ===");
    let flags = root.intern_flags(
        ["python_targets_python3_7", "test"]
            .iter()
            .map(|s| s.to_string())
            .collect(),
    );
    let testing = pkg.with_use(&flags);
    println!("RESTRICT:     {}", testing.metadata(MetadataKey::Restrict));
    println!("Same as new:  {}", *testing == *pkg);

    println!("\n=== Matching ===");
    let candidates = [Rc::clone(&pkg), testing];
    for text in [
        "dev-python/clang-python",
        ">=dev-python/clang-python-10.0.0:0",
        "dev-python/clang-python[test]",
        "<dev-python/clang-python-10",
    ] {
        let atom = Atom::parse(text).expect("invalid atom");
        let matched = match_from_list(&atom, candidates.iter().map(|pkg| pkg.as_ref()));
        println!("{text:40} {} match(es)", matched.len());
    }
}

fn join<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| s.as_ref().to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
