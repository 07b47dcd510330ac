use mutag::config::Parameters;
use mutag::configs::AnalysisKind;
use mutag::cut::Context;
use mutag::event::{Collection, EventBatch, EventField, Field, ObjectCollection};
use mutag::sample::{Era, SampleInfo};
use mutag::workflow::{process_batches, Processor, Resources};

const ERA: Era = Era::Run2022PostEE;
const SAMPLE: &str = "QCD_MuEnriched";
const CALIBRATION: &str = include_str!("../params/mutag_calibration.yaml");
const FLAT_WEIGHTS: &str = r#"
ptetatau21_reweighting:
  "2022_postEE":
    - &flat
      pt: [300, 2500]
      eta: [-5, 5]
      tau21: [0, 1]
      weights: [2]
    - *flat
"#;

const FLAGS: [&str; 8] = [
    "goodVertices",
    "globalSuperTightHalo2016Filter",
    "EcalDeadCellTriggerPrimitiveFilter",
    "BadPFMuonFilter",
    "BadPFMuonDzFilter",
    "hfNoisyHitsFilter",
    "eeBadScFilter",
    "ecalBadCalibFilter",
];

/// Four events with generator weights 1.5, 1, 2 and 1
///
/// 0: jets A (pt 500), C (pt 450) and B (pt 400). A and B have a muon,
///    so only A survives the truncation to two jets and the mu-tag.
/// 1: fails the trigger
/// 2: a single mu-tagged charm jet D (pt 380, msd 40)
/// 3: fails the good vertex requirement
fn events() -> EventBatch {
    batch(Some(vec![1.5, 1., 2., 1.]))
}

fn batch(gen_weight: Option<Vec<f64>>) -> EventBatch {
    let fatjets = ObjectCollection::from_nested(
        Field::Pt,
        vec![vec![500., 450., 400.], vec![300.], vec![380.], vec![500.]],
    )
    .with_nested(Field::Eta, vec![vec![0.5, 0., -1.], vec![0.], vec![1.], vec![0.]])
    .with_nested(Field::Phi, vec![vec![0., -1.5, 3.], vec![0.], vec![1.], vec![0.]])
    .with_nested(
        Field::Mass,
        vec![vec![110., 60., 70.], vec![60.], vec![50.], vec![100.]],
    )
    .with_nested(
        Field::MSoftdrop,
        vec![vec![100., 50., 60.], vec![50.], vec![40.], vec![90.]],
    )
    .with_nested(Field::Tau1, vec![vec![0.5, 0.4, 0.4], vec![0.5], vec![0.5], vec![0.5]])
    .with_nested(Field::Tau2, vec![vec![0.2, 0.3, 0.3], vec![0.2], vec![0.3], vec![0.2]])
    .with_nested(Field::JetId, vec![vec![6., 6., 6.], vec![6.], vec![6.], vec![6.]])
    .with_nested(
        Field::HadronFlavour,
        vec![vec![5., 0., 0.], vec![0.], vec![4.], vec![0.]],
    )
    .with_nested(Field::NBHadrons, vec![vec![2., 0., 0.], vec![0.], vec![0.], vec![0.]])
    .with_nested(Field::NCHadrons, vec![vec![0., 0., 0.], vec![0.], vec![1.], vec![0.]])
    .with_nested(
        Field::ParticleNetXbbVsQcd,
        vec![vec![0.955, 0.1, 0.1], vec![0.5], vec![0.3], vec![0.5]],
    )
    .with_nested(
        Field::ParticleNetMassCorr,
        vec![vec![1., 1., 1.], vec![1.], vec![1.], vec![1.]],
    );
    let muons = ObjectCollection::from_nested(
        Field::Pt,
        vec![vec![10., 8.], vec![10.], vec![12.], vec![10.]],
    )
    .with_nested(Field::Eta, vec![vec![0.55, -1.], vec![0.], vec![1.1], vec![0.]])
    .with_nested(Field::Phi, vec![vec![0.1, 2.9], vec![0.], vec![1.], vec![0.]])
    .with_nested(
        Field::PfRelIso04All,
        vec![vec![0.05, 0.05], vec![0.05], vec![0.05], vec![0.05]],
    )
    .with_nested(Field::TightId, vec![vec![1., 1.], vec![1.], vec![1.], vec![1.]]);

    let mut events = EventBatch::new(4)
        .with_scalar(EventField::NPvGood, vec![10., 10., 10., 0.])
        .with_scalar(EventField::Run, vec![1.; 4])
        .with_scalar(EventField::LuminosityBlock, vec![5., 5., 50., 5.])
        .with_hlt("BTagMu_AK8Jet300_Mu5", vec![true, false, true, true])
        .with_collection(Collection::FatJet, fatjets)
        .with_collection(Collection::Muon, muons);
    if let Some(w) = gen_weight {
        events = events.with_scalar(EventField::GenWeight, w);
    }
    for flag in FLAGS {
        events = events.with_flag(flag, vec![true; 4]);
    }
    events
}

fn run(processor: &dyn Processor, batches: &[(SampleInfo, EventBatch)]) -> mutag::histogram::Output {
    let resources = Resources::from_config(processor.config()).unwrap();
    process_batches(processor, batches, &resources).unwrap()
}

#[test]
fn pt_reweighting() {
    let params = Parameters::defaults().unwrap();
    let processor = AnalysisKind::PtReweighting.processor(params, ERA).unwrap();
    let batches = [(SampleInfo::mc(SAMPLE, ERA), events())];
    let out = run(processor.as_ref(), &batches);

    assert_eq!(out.cutflow["initial"][SAMPLE], 5.5);
    assert_eq!(out.cutflow["skim"][SAMPLE], 3.5);
    assert_eq!(out.cutflow["presel"][SAMPLE], 3.5);

    let bb = "QCD_MuEnriched_bb";
    let c = "QCD_MuEnriched_c";
    assert_eq!(out.cutflow["pt300msd80"][bb], 1.5);
    assert_eq!(out.cutflow["pt300msd80"][c], 0.);
    assert_eq!(out.cutflow["pt300msd30"][c], 2.);
    assert_eq!(
        out.cutflow["leadpt300msd50subleadpt250msd50mreg50to200"][bb],
        0.
    );

    let pt = out.histogram("FatJetGood_pt", "pt300msd30", bb).unwrap();
    assert_eq!(pt.total(), 1.5);
    let pt = out.histogram("FatJetGood_pt", "pt300msd30", c).unwrap();
    assert_eq!(pt.total(), 2.);
    // light jets C and B are gone after truncation and mu-tagging
    let light = out
        .histogram("FatJetGood_pt", "pt300msd30", "QCD_MuEnriched_l")
        .unwrap();
    assert_eq!(light.total(), 0.);

    // jet A: position 0, pt bin [500, 550), eta bin [0.5, 0.75)
    let map = out
        .histogram("FatJetGood_pt_eta", "pt300msd80", bb)
        .unwrap();
    assert_eq!(map.bin(&[0, 7, 11]), Some(1.5));
    assert_eq!(map.total(), 1.5);

    // btag is the ParticleNet score before 2024
    let btag = out.histogram("FatJetGood_btag", "pt300msd80", bb).unwrap();
    assert_eq!(btag.bin(&[38]), Some(1.5));
}

#[test]
fn batches_are_merged() {
    let params = Parameters::defaults().unwrap();
    let processor = AnalysisKind::PtReweighting.processor(params, ERA).unwrap();
    let single = run(
        processor.as_ref(),
        &[(SampleInfo::mc(SAMPLE, ERA), events())],
    );
    let batches = vec![(SampleInfo::mc(SAMPLE, ERA), events()); 3];
    let merged = run(processor.as_ref(), &batches);
    assert_eq!(merged.cutflow["skim"][SAMPLE], 3. * single.cutflow["skim"][SAMPLE]);
    let hist = |out: &mutag::histogram::Output| {
        out.histogram("FatJetGood_pt", "pt300msd30to210", "QCD_MuEnriched_c")
            .unwrap()
            .total()
    };
    assert_eq!(hist(&merged), 3. * hist(&single));
}

#[test]
fn fit_templates() {
    let params = Parameters::from_yaml_layers(&[CALIBRATION, FLAT_WEIGHTS]).unwrap();
    let processor = AnalysisKind::FitTemplates.processor(params, ERA).unwrap();
    let batches = [(SampleInfo::mc(SAMPLE, ERA), events())];
    let out = run(processor.as_ref(), &batches);

    let bb = "QCD_MuEnriched_bb";
    let pass = "msd-80to120__Pt-450toInf__particleNet_XbbVsQCD-L-pass";
    let fail = "msd-80to120__Pt-450toInf__particleNet_XbbVsQCD-T-fail";
    // the cutflow counts events, histograms carry the jet weight
    assert_eq!(out.cutflow[pass][bb], 1.5);
    assert_eq!(out.cutflow[fail][bb], 1.5);
    let hist = out.histogram("FatJetGood_pt", pass, bb).unwrap();
    assert_eq!(hist.total(), 3.);
    let hist = out.histogram("FatJetGood_pt", "inclusive", "QCD_MuEnriched_c").unwrap();
    assert_eq!(hist.total(), 4.);

    let empty = "msd-80to120__Pt-450toInf__particleNet_XbbVsQCD-M-fail";
    assert_eq!(out.cutflow[empty][bb], 0.);
}

#[test]
fn data() {
    let params = Parameters::from_yaml_layers(&[CALIBRATION, FLAT_WEIGHTS]).unwrap();
    let processor = AnalysisKind::FitTemplates.processor(params, ERA).unwrap();
    let sample = SampleInfo::data("DATA_BTagMu", ERA, "BTagMu");
    let batches = [(sample, batch(None))];

    // data needs certified luminosity sections
    let resources = Resources::from_config(processor.config()).unwrap();
    assert!(process_batches(processor.as_ref(), &batches, &resources).is_err());

    let golden = std::env::temp_dir().join(format!("mutag-golden-{}.json", std::process::id()));
    std::fs::write(&golden, r#"{"1": [[1, 10]]}"#).unwrap();
    let lumi = format!("lumi:\n  goldenJSON:\n    \"2022_postEE\": {golden:?}\n");
    let params =
        Parameters::from_yaml_layers(&[CALIBRATION, FLAT_WEIGHTS, lumi.as_str()]).unwrap();
    let processor = AnalysisKind::FitTemplates.processor(params, ERA).unwrap();
    let out = run(processor.as_ref(), &batches);
    std::fs::remove_file(golden).unwrap();

    let name = "DATA_BTagMu";
    assert_eq!(out.cutflow["initial"][name], 4.);
    // event 2 is outside the certified sections
    assert_eq!(out.cutflow["skim"][name], 1.);
    let pass = "msd-80to120__Pt-450toInf__particleNet_XbbVsQCD-L-pass";
    let hist = out.histogram("FatJetGood_pt", pass, name).unwrap();
    // data jets are not reweighted
    assert_eq!(hist.total(), 1.);
    assert!(out.histogram("FatJetGood_pt", pass, "QCD_MuEnriched_bb").is_none());
}

#[test]
fn fatjet_base() {
    let params = Parameters::defaults().unwrap();
    let processor = AnalysisKind::FatjetBase.processor(params, ERA).unwrap();
    let sample = SampleInfo::mc(SAMPLE, ERA);

    let resources = Resources::from_config(processor.config()).unwrap();
    let ctx = Context {
        sample: &sample,
        parameters: &processor.config().parameters,
        triggers: resources.triggers.as_ref(),
        lumi_mask: None,
    };
    let presel = processor.apply_object_preselection(&events(), &ctx).unwrap();
    let jets = presel.collection(Collection::FatJetGood).unwrap();
    // no truncation and no mu-tag requirement
    assert_eq!(jets.counts(), vec![3, 0, 1, 1]);
    let col = |f| jets.column(f).unwrap().values().to_vec();
    assert_eq!(col(Field::Pt), vec![500., 450., 400., 380., 500.]);
    assert_eq!(col(Field::NMuonGoodMatchedToFatJetGood), vec![1., 0., 1., 1., 0.]);
    assert!(jets.has_field(Field::Tau21));
    assert!(jets.has_field(Field::MassReg));
    assert!(!jets.has_field(Field::Pos));
    assert!(!jets.has_field(Field::Btag));
    let muons = presel.collection(Collection::MuonGood).unwrap();
    assert_eq!(muons.counts(), vec![2, 1, 1, 1]);

    let out = run(processor.as_ref(), &[(sample, events())]);
    assert_eq!(out.cutflow["skim"][SAMPLE], 3.5);
    assert_eq!(out.cutflow["presel"][SAMPLE], 3.5);
    assert_eq!(out.cutflow["inclusive"]["QCD_MuEnriched_bb"], 1.5);
    assert_eq!(out.cutflow["inclusive"]["QCD_MuEnriched_l"], 1.5);
    assert_eq!(out.cutflow["inclusive"]["QCD_MuEnriched_c"], 2.);
    // jets C and B are both light
    let light = out
        .histogram("FatJetGood_pt", "inclusive", "QCD_MuEnriched_l")
        .unwrap();
    assert_eq!(light.total(), 3.);
}

#[test]
fn non_finite_angles_are_rejected() {
    let params = Parameters::defaults().unwrap();
    let processor = AnalysisKind::PtReweighting.processor(params, ERA).unwrap();
    let events = events();
    let muons = events
        .collection(Collection::Muon)
        .unwrap()
        .clone()
        .with_field(Field::Phi, vec![f64::INFINITY, 2.9, 0., 1., 0.]);
    let events = events.with_collection(Collection::Muon, muons);
    let resources = Resources::from_config(processor.config()).unwrap();
    let res = process_batches(
        processor.as_ref(),
        &[(SampleInfo::mc(SAMPLE, ERA), events)],
        &resources,
    );
    assert!(matches!(res, Err(mutag::Error::InvalidBatch(_))));
}

#[test]
fn layered_parameters() {
    let params = Parameters::from_yaml_layers(&[r#"
object_preselection:
  FatJet:
    pt: 400.
"#])
    .unwrap();
    assert_eq!(params.object_preselection.fatjet.pt, 400.);
    assert_eq!(params.object_preselection.fatjet.eta, 2.4);

    let processor = AnalysisKind::PtReweighting.processor(params, ERA).unwrap();
    let out = run(processor.as_ref(), &[(SampleInfo::mc(SAMPLE, ERA), events())]);
    // jet D is below the raised threshold
    assert_eq!(out.cutflow["presel"][SAMPLE], 1.5);
    assert_eq!(out.cutflow["pt300msd30"]["QCD_MuEnriched_c"], 0.);
}
