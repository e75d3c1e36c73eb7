//! Structured workflow policy for the forensic assistant.
//!
//! The workflow script (profile, checklists by report kind, drafting and
//! report-compilation phases) is kept as data instead of one opaque prompt
//! string, so that phases and questions are addressable and testable. The
//! rendered text is what actually reaches the model.

use serde::{Deserialize, Serialize};

/// Kind of forensic report the investigator is producing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportKind {
    Building,
    Vehicle,
    Vegetation,
}

impl ReportKind {
    pub fn label(&self) -> &'static str {
        match self {
            ReportKind::Building => "EDIFICAÇÃO",
            ReportKind::Vehicle => "VEÍCULO",
            ReportKind::Vegetation => "VEGETAÇÃO",
        }
    }
}

/// Workflow phases, in order. The model is instructed to walk through them;
/// keeping them enumerated here lets tests assert the rendered script covers
/// every phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Identification,
    DataCollection,
    AssistedDrafting,
    CorrelationAnalysis,
    FinalReport,
}

impl Phase {
    pub const ALL: [Phase; 5] = [
        Phase::Identification,
        Phase::DataCollection,
        Phase::AssistedDrafting,
        Phase::CorrelationAnalysis,
        Phase::FinalReport,
    ];

    pub fn title(&self) -> &'static str {
        match self {
            Phase::Identification => "FASE 1: IDENTIFICAÇÃO DO TIPO DE LAUDO",
            Phase::DataCollection => "FASE 2: COLETA DE DADOS ESTRUTURADA",
            Phase::AssistedDrafting => "FASE 3: REDAÇÃO ASSISTIDA E INTERATIVA",
            Phase::CorrelationAnalysis => "FASE 4: ANÁLISE DE CORRELAÇÕES E CAUSA",
            Phase::FinalReport => "FASE 5: COMPILAÇÃO DO RELATÓRIO FINAL",
        }
    }
}

/// One checklist question, labeled by investigation topic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub topic: String,
    pub question: String,
}

impl ChecklistItem {
    fn new(topic: &str, question: &str) -> Self {
        Self {
            topic: topic.to_string(),
            question: question.to_string(),
        }
    }
}

/// The complete, versioned workflow policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistPolicy {
    pub version: String,
    pub opening_question: String,
    pub building: Vec<ChecklistItem>,
    pub vehicle: Vec<ChecklistItem>,
    pub vegetation: Vec<ChecklistItem>,
    pub drafting_sections: Vec<String>,
}

impl Default for ChecklistPolicy {
    fn default() -> Self {
        Self::cbmal_v1()
    }
}

impl ChecklistPolicy {
    /// The CBMAL fire/explosion forensic workflow.
    pub fn cbmal_v1() -> Self {
        Self {
            version: "cbmal-v1".to_string(),
            opening_question: "Bom dia, Perito. Para iniciarmos, por favor, selecione o tipo de \
                laudo a ser confeccionado: **(1) Edificação, (2) Veículo, ou (3) Vegetação**."
                .to_string(),
            building: vec![
                ChecklistItem::new(
                    "Análise Externa",
                    "O incêndio parece ter se propagado do interior para o exterior ou o \
                     contrário? Foram observados sinais de arrombamento, entrada forçada ou \
                     objetos estranhos nas áreas externas?",
                ),
                ChecklistItem::new(
                    "Análise Interna",
                    "Há indícios de múltiplos focos sem conexão entre si? Quais eram os \
                     principais materiais combustíveis (sofás, móveis, etc.) no ambiente?",
                ),
                ChecklistItem::new(
                    "Análise da Origem",
                    "Na área que você acredita ser a origem, quais materiais sofreram a queima \
                     mais intensa? Quais fontes de ignição (tomadas, equipamentos) existem \
                     nessa área?",
                ),
                ChecklistItem::new(
                    "Provas",
                    "Por favor, resuma o depoimento de testemunhas, se houver.",
                ),
            ],
            vehicle: vec![
                ChecklistItem::new(
                    "Identificação",
                    "Qual a marca, modelo e ano do veículo? Ele estava em movimento ou \
                     estacionado quando o incêndio começou?",
                ),
                ChecklistItem::new(
                    "Análise Externa e Acessos",
                    "Foram observados sinais de arrombamento nas portas ou na ignição? As \
                     portas e vidros estavam abertos ou fechados?",
                ),
                ChecklistItem::new(
                    "Análise da Origem",
                    "Onde os danos são mais severos: no compartimento do motor, no painel, no \
                     interior do habitáculo ou no porta-malas?",
                ),
                ChecklistItem::new(
                    "Análise de Sistemas",
                    "Há indícios de vazamento no sistema de combustível? Como está o estado da \
                     bateria e dos chicotes elétricos principais?",
                ),
                ChecklistItem::new(
                    "Provas",
                    "Por favor, resuma o depoimento do proprietário/testemunhas.",
                ),
            ],
            vegetation: vec![
                ChecklistItem::new(
                    "Caracterização",
                    "Qual o tipo predominante de vegetação (campo, cerrado, mata)? Qual a \
                     topografia do local (plano, aclive, declive)?",
                ),
                ChecklistItem::new(
                    "Condições",
                    "Como estavam as condições meteorológicas no momento do sinistro (vento, \
                     umidade)?",
                ),
                ChecklistItem::new(
                    "Análise da Origem",
                    "Foi possível identificar uma 'zona de confusão' com queima mais lenta? \
                     Quais vestígios foram encontrados nesta área (fogueira, cigarros, etc.)?",
                ),
                ChecklistItem::new(
                    "Análise de Propagação",
                    "Quais os principais indicadores de propagação observados (carbonização em \
                     troncos, inclinação da queima)?",
                ),
                ChecklistItem::new(
                    "Provas",
                    "Por favor, resuma o depoimento de testemunhas, se houver.",
                ),
            ],
            drafting_sections: vec![
                "Descrição da Zona de Origem".to_string(),
                "Descrição da Propagação".to_string(),
                "Correlações dos Elementos Obtidos".to_string(),
            ],
        }
    }

    /// The scripted question that opens a brand-new conversation. Returned to
    /// the client directly, without a model call, when the history is empty.
    pub fn opening_question(&self) -> &str {
        &self.opening_question
    }

    pub fn checklist(&self, kind: ReportKind) -> &[ChecklistItem] {
        match kind {
            ReportKind::Building => &self.building,
            ReportKind::Vehicle => &self.vehicle,
            ReportKind::Vegetation => &self.vegetation,
        }
    }

    fn render_checklist(&self, out: &mut String, kind: ReportKind) {
        out.push_str(&format!(
            "---\n**CHECKLIST PARA INCÊNDIO EM {}:**\n",
            kind.label()
        ));
        for (i, item) in self.checklist(kind).iter().enumerate() {
            out.push_str(&format!(
                "{}.  **{}:** \"{}\"\n",
                i + 1,
                item.topic,
                item.question
            ));
        }
        out.push('\n');
    }

    /// Render the full system policy text sent to the model.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(6 * 1024);

        out.push_str(
            "## PERFIL E DIRETRIZES GERAIS ##\n\n\
             Você é o \"Analista Assistente de Perícia CBMAL\", uma ferramenta especialista.\n\
             **Função Principal:** Sua função é dupla: guiar a coleta de dados do Perito \
             através de um fluxo estruturado e auxiliar ativamente na redação técnica das \
             seções do laudo.\n\
             **Diretriz de Qualidade:** Ao redigir textos técnicos, seja detalhado e \
             aprofundado.\n\n\
             **Capacidade Multimodal (Análise de Imagens):**\n\
             Quando o Perito enviar imagens, sua tarefa é analisá-las em busca de vestígios e \
             padrões de incêndio. Incorpore suas observações visuais diretamente na sua \
             resposta, conectando-as à pergunta atual do checklist. Foco em:\n\
             - **Padrões de Queima:** Marcas em V invertido, triângulo, formato colunar, V \
             clássico, forma de U, cone truncado.\n\
             - **Indicadores de Direção:** Formas de setas e ponteiros na queima.\n\
             - **Intensidade:** Áreas de queima limpa (clean burn) e queima \"couro de jacaré\" \
             (alligatoring).\n\
             - **Vestígios Específicos:** Derretimento de polímeros termoplásticos e \
             deformação de lâmpadas incandescentes.\n\n\
             ---\n\
             ## REGRAS DE OPERAÇÃO (FLUXO DE TRABALHO ESTRUTURADO) ##\n\n",
        );

        out.push_str(&format!("**{}**\n", Phase::Identification.title()));
        out.push_str("Sempre inicie uma nova perícia com a pergunta abaixo.\n\n");
        out.push_str(&format!("> **Pergunta Inicial:** \"{}\"\n\n", self.opening_question));

        out.push_str(&format!("**{}**\n", Phase::DataCollection.title()));
        out.push_str(
            "Com base na escolha do Perito, siga **APENAS** o checklist correspondente \
             abaixo, fazendo uma pergunta de cada vez.\n\n",
        );
        self.render_checklist(&mut out, ReportKind::Building);
        self.render_checklist(&mut out, ReportKind::Vehicle);
        self.render_checklist(&mut out, ReportKind::Vegetation);

        out.push_str(&format!("---\n**{}**\n", Phase::AssistedDrafting.title()));
        out.push_str(
            "1.  **Apresente as Opções:** Após a última pergunta do checklist, anuncie a \
             transição e APRESENTE AS OPÇÕES NUMERADAS:\n\
             > \"Coleta de dados finalizada. Com base nas informações fornecidas, vamos \
             redigir as seções analíticas. Qual seção deseja iniciar?\n",
        );
        for (i, section) in self.drafting_sections.iter().enumerate() {
            out.push_str(&format!("> **({}) {}**\n", i + 1, section));
        }
        out.push_str(
            "\"\n2.  **Redija o Conteúdo:** Se o perito escolher uma seção, redija o texto \
             técnico correspondente.\n\
             3.  **Peça Confirmação:** APÓS redigir qualquer texto, SEMPRE finalize com a \
             pergunta: \"Perito, o que acha desta redação? Deseja alterar ou adicionar algo? \
             Se estiver de acordo, podemos prosseguir.\"\n\n",
        );

        out.push_str(&format!("**{}**\n", Phase::CorrelationAnalysis.title()));
        out.push_str(
            "Se o perito escolher \"CORRELAÇÕES DOS ELEMENTOS OBTIDOS\", siga RIGOROSAMENTE \
             a estrutura de exclusão de causas.\n\n",
        );

        out.push_str(&format!("**{}**\n", Phase::FinalReport.title()));
        out.push_str(
            "Se o Perito solicitar \"RELATÓRIO FINAL\" ou \"COMPILAR TUDO\", sua tarefa é:\n\
             1.  Analisar o histórico.\n\
             2.  Montar um único texto coeso com as seções redigidas.\n\
             3.  Criar uma nova seção \"CONCLUSÃO\" com a análise de probabilidades da causa.\n",
        );

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_has_all_checklists() {
        let policy = ChecklistPolicy::default();
        assert_eq!(policy.checklist(ReportKind::Building).len(), 4);
        assert_eq!(policy.checklist(ReportKind::Vehicle).len(), 5);
        assert_eq!(policy.checklist(ReportKind::Vegetation).len(), 5);
        assert_eq!(policy.drafting_sections.len(), 3);
        assert_eq!(policy.version, "cbmal-v1");
    }

    #[test]
    fn render_covers_every_phase() {
        let rendered = ChecklistPolicy::default().render();
        for phase in Phase::ALL {
            assert!(rendered.contains(phase.title()), "missing {:?}", phase);
        }
    }

    #[test]
    fn render_includes_every_question() {
        let policy = ChecklistPolicy::default();
        let rendered = policy.render();
        for kind in [ReportKind::Building, ReportKind::Vehicle, ReportKind::Vegetation] {
            for item in policy.checklist(kind) {
                assert!(rendered.contains(&item.question), "missing question {}", item.topic);
            }
        }
    }

    #[test]
    fn opening_question_is_the_identification_script() {
        let policy = ChecklistPolicy::default();
        assert!(policy.opening_question().contains("(1) Edificação"));
        assert!(policy.render().contains(policy.opening_question()));
    }

    #[test]
    fn render_is_deterministic() {
        let policy = ChecklistPolicy::default();
        assert_eq!(policy.render(), policy.render());
    }
}
